//! Schema introspection
//!
//! The queries the pipeline needs from the database: existence checks, type
//! and owner lookups, and DDL extraction through the server's own deparsers.

use async_trait::async_trait;
use sqlx::postgres::PgPool;

use crate::db::connection::DatabaseConnection;
use crate::error::{Error, Result};
use crate::schema::types::{DbObject, DependentDdl, ObjectType};

/// Schema introspection trait
#[async_trait]
pub trait SchemaIntrospector: Send + Sync {
    /// Whether an object of the given type exists in the owner schema
    async fn object_exists(&self, name: &str, object_type: ObjectType) -> Result<bool>;

    /// The type of the object a comment was attached to
    async fn resolve_object_type(&self, name: &str) -> Result<Option<ObjectType>>;

    /// The table an index, trigger or sequence belongs to
    async fn resolve_owning_table(
        &self,
        name: &str,
        object_type: ObjectType,
    ) -> Result<Option<String>>;

    /// Raw DDL of a table, view or package
    async fn extract_ddl(&self, name: &str, object_type: ObjectType) -> Result<String>;

    /// Raw DDL of every dependent object of one type owned by `owner`
    async fn extract_dependent_ddl(
        &self,
        owner: &str,
        dependent_type: ObjectType,
    ) -> Result<Vec<String>>;
}

/// Collect the dependent DDL folded into an object's file
pub async fn extract_dependents(
    introspector: &dyn SchemaIntrospector,
    object: &DbObject,
) -> Result<DependentDdl> {
    let mut dependents = DependentDdl::default();
    match object.object_type {
        ObjectType::Table => {
            tracing::debug!(table = %object.name, "Adding comments, indexes, sequences and triggers");
            dependents.comments = introspector
                .extract_dependent_ddl(&object.name, ObjectType::Comment)
                .await?;
            dependents.indexes = introspector
                .extract_dependent_ddl(&object.name, ObjectType::Index)
                .await?;
            dependents.sequences = introspector
                .extract_dependent_ddl(&object.name, ObjectType::Sequence)
                .await?;
            dependents.triggers = introspector
                .extract_dependent_ddl(&object.name, ObjectType::Trigger)
                .await?;
        }
        ObjectType::View => {
            tracing::debug!(view = %object.name, "Adding view comments");
            dependents.comments = introspector
                .extract_dependent_ddl(&object.name, ObjectType::Comment)
                .await?;
        }
        _ => {}
    }
    Ok(dependents)
}

/// `pg_class.relkind` values per object type
fn relkinds(object_type: ObjectType) -> Option<&'static [&'static str]> {
    match object_type {
        ObjectType::Table => Some(&["r", "p"]),
        ObjectType::View => Some(&["v", "m"]),
        ObjectType::Index => Some(&["i", "I"]),
        ObjectType::Sequence => Some(&["S"]),
        _ => None,
    }
}

fn object_type_for_relkind(relkind: &str) -> Option<ObjectType> {
    match relkind {
        "r" | "p" => Some(ObjectType::Table),
        "v" | "m" => Some(ObjectType::View),
        "i" | "I" => Some(ObjectType::Index),
        "S" => Some(ObjectType::Sequence),
        _ => None,
    }
}

/// Indexes of a table that don't back a constraint.
///
/// The pretty form leaves out schemas on the `search_path`, which the owner
/// connection sets to the owner schema.
const DEPENDENT_INDEXES: &str = r#"
    SELECT pg_get_indexdef(x.indexrelid, 0, true) || ' ;'
    FROM pg_index x
    JOIN pg_class t ON t.oid = x.indrelid
    JOIN pg_class i ON i.oid = x.indexrelid
    JOIN pg_namespace n ON n.oid = t.relnamespace
    WHERE lower(n.nspname) = lower($1)
      AND lower(t.relname) = lower($2)
      AND NOT EXISTS (
          SELECT 1 FROM pg_constraint k
          WHERE k.conindid = x.indexrelid AND k.conrelid = x.indrelid
      )
    ORDER BY i.relname
"#;

/// User triggers of a table, pretty-printed like the indexes
const DEPENDENT_TRIGGERS: &str = r#"
    SELECT pg_get_triggerdef(g.oid, true) || ';'
    FROM pg_trigger g
    JOIN pg_class t ON t.oid = g.tgrelid
    JOIN pg_namespace n ON n.oid = t.relnamespace
    WHERE lower(n.nspname) = lower($1)
      AND lower(t.relname) = lower($2)
      AND NOT g.tgisinternal
    ORDER BY g.tgname
"#;

/// PostgreSQL schema introspector
///
/// PostgreSQL has no packages: they never exist and can't be extracted.
#[derive(Debug, Clone)]
pub struct PostgresIntrospector {
    pool: PgPool,
    schema: String,
}

impl PostgresIntrospector {
    pub fn new(connection: &DatabaseConnection, owner_schema: &str) -> Self {
        Self {
            pool: connection.pool().clone(),
            schema: owner_schema.to_string(),
        }
    }
}

#[async_trait]
impl SchemaIntrospector for PostgresIntrospector {
    async fn object_exists(&self, name: &str, object_type: ObjectType) -> Result<bool> {
        if let Some(kinds) = relkinds(object_type) {
            let sql = r#"
                SELECT EXISTS (
                    SELECT 1
                    FROM pg_class c
                    JOIN pg_namespace n ON n.oid = c.relnamespace
                    WHERE lower(n.nspname) = lower($1)
                      AND lower(c.relname) = lower($2)
                      AND c.relkind::text = ANY($3)
                )
            "#;

            let exists = sqlx::query_scalar::<_, bool>(sql)
                .bind(&self.schema)
                .bind(name)
                .bind(kinds)
                .fetch_one(&self.pool)
                .await?;
            return Ok(exists);
        }

        match object_type {
            ObjectType::Trigger => {
                let sql = r#"
                    SELECT EXISTS (
                        SELECT 1
                        FROM pg_trigger g
                        JOIN pg_class c ON c.oid = g.tgrelid
                        JOIN pg_namespace n ON n.oid = c.relnamespace
                        WHERE lower(n.nspname) = lower($1)
                          AND lower(g.tgname) = lower($2)
                          AND NOT g.tgisinternal
                    )
                "#;

                let exists = sqlx::query_scalar::<_, bool>(sql)
                    .bind(&self.schema)
                    .bind(name)
                    .fetch_one(&self.pool)
                    .await?;
                Ok(exists)
            }
            ObjectType::PackageSpec | ObjectType::PackageBody => Ok(false),
            _ => Err(Error::IntrospectionError(format!(
                "Can't check existence of {} {}",
                object_type, name
            ))),
        }
    }

    async fn resolve_object_type(&self, name: &str) -> Result<Option<ObjectType>> {
        let sql = r#"
            SELECT c.relkind::text
            FROM pg_class c
            JOIN pg_namespace n ON n.oid = c.relnamespace
            WHERE lower(n.nspname) = lower($1)
              AND lower(c.relname) = lower($2)
            LIMIT 1
        "#;

        let relkind = sqlx::query_scalar::<_, String>(sql)
            .bind(&self.schema)
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;

        Ok(relkind.as_deref().and_then(object_type_for_relkind))
    }

    async fn resolve_owning_table(
        &self,
        name: &str,
        object_type: ObjectType,
    ) -> Result<Option<String>> {
        let sql = match object_type {
            ObjectType::Index => {
                r#"
                SELECT t.relname::text
                FROM pg_index x
                JOIN pg_class i ON i.oid = x.indexrelid
                JOIN pg_class t ON t.oid = x.indrelid
                JOIN pg_namespace n ON n.oid = i.relnamespace
                WHERE lower(n.nspname) = lower($1)
                  AND lower(i.relname) = lower($2)
                "#
            }
            ObjectType::Trigger => {
                r#"
                SELECT t.relname::text
                FROM pg_trigger g
                JOIN pg_class t ON t.oid = g.tgrelid
                JOIN pg_namespace n ON n.oid = t.relnamespace
                WHERE lower(n.nspname) = lower($1)
                  AND lower(g.tgname) = lower($2)
                  AND NOT g.tgisinternal
                "#
            }
            ObjectType::Sequence => {
                r#"
                SELECT t.relname::text
                FROM pg_class s
                JOIN pg_namespace n ON n.oid = s.relnamespace
                JOIN pg_depend d ON d.objid = s.oid
                    AND d.classid = 'pg_class'::regclass
                    AND d.refclassid = 'pg_class'::regclass
                    AND d.deptype IN ('a', 'i')
                JOIN pg_class t ON t.oid = d.refobjid
                WHERE s.relkind = 'S'
                  AND lower(n.nspname) = lower($1)
                  AND lower(s.relname) = lower($2)
                "#
            }
            _ => return Ok(None),
        };

        let table = sqlx::query_scalar::<_, String>(sql)
            .bind(&self.schema)
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;

        Ok(table.filter(|t| !t.trim().is_empty()))
    }

    async fn extract_ddl(&self, name: &str, object_type: ObjectType) -> Result<String> {
        let sql = match object_type {
            ObjectType::Table => {
                r#"
                SELECT 'CREATE TABLE "' || n.nspname || '"."' || c.relname || '" ' || E'\n   (' ||
                       string_agg(
                           E'\t"' || a.attname || '" ' || format_type(a.atttypid, a.atttypmod)
                           || COALESCE(' DEFAULT ' || pg_get_expr(d.adbin, d.adrelid), '')
                           || CASE WHEN a.attnotnull THEN ' NOT NULL' ELSE '' END,
                           E', \n' ORDER BY a.attnum
                       )
                       || COALESCE((
                           SELECT string_agg(
                               E', \n\t CONSTRAINT "' || k.conname || '" ' || pg_get_constraintdef(k.oid, true),
                               '' ORDER BY k.contype DESC, k.conname
                           )
                           FROM pg_constraint k
                           WHERE k.conrelid = c.oid
                       ), '')
                       || E'\n   ) ;'
                FROM pg_class c
                JOIN pg_namespace n ON n.oid = c.relnamespace
                JOIN pg_attribute a ON a.attrelid = c.oid AND a.attnum > 0 AND NOT a.attisdropped
                LEFT JOIN pg_attrdef d ON d.adrelid = c.oid AND d.adnum = a.attnum
                WHERE lower(n.nspname) = lower($1)
                  AND lower(c.relname) = lower($2)
                  AND c.relkind IN ('r', 'p')
                GROUP BY n.nspname, c.relname, c.oid
                "#
            }
            ObjectType::View => {
                r#"
                SELECT CASE c.relkind WHEN 'm' THEN 'CREATE MATERIALIZED VIEW "' ELSE 'CREATE OR REPLACE VIEW "' END
                       || n.nspname || '"."' || c.relname || E'" AS\n' || pg_get_viewdef(c.oid, true)
                FROM pg_class c
                JOIN pg_namespace n ON n.oid = c.relnamespace
                WHERE lower(n.nspname) = lower($1)
                  AND lower(c.relname) = lower($2)
                  AND c.relkind IN ('v', 'm')
                "#
            }
            _ => {
                return Err(Error::IntrospectionError(format!(
                    "Can't extract DDL of {} {}",
                    object_type, name
                )))
            }
        };

        sqlx::query_scalar::<_, String>(sql)
            .bind(&self.schema)
            .bind(name)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| {
                Error::IntrospectionError(format!("{} {} not found", object_type, name))
            })
    }

    async fn extract_dependent_ddl(
        &self,
        owner: &str,
        dependent_type: ObjectType,
    ) -> Result<Vec<String>> {
        let sql = match dependent_type {
            ObjectType::Index => DEPENDENT_INDEXES,
            ObjectType::Trigger => DEPENDENT_TRIGGERS,
            ObjectType::Sequence => {
                r#"
                SELECT 'CREATE SEQUENCE "' || sn.nspname || '"."' || s.relname || '"'
                       || ' INCREMENT BY ' || q.seqincrement
                       || ' MINVALUE ' || q.seqmin
                       || ' MAXVALUE ' || q.seqmax
                       || ' START WITH ' || q.seqstart
                       || ' CACHE ' || q.seqcache
                       || CASE WHEN q.seqcycle THEN ' CYCLE' ELSE ' NO CYCLE' END
                       || ' ;'
                FROM pg_class s
                JOIN pg_namespace sn ON sn.oid = s.relnamespace
                JOIN pg_sequence q ON q.seqrelid = s.oid
                JOIN pg_depend d ON d.objid = s.oid
                    AND d.classid = 'pg_class'::regclass
                    AND d.refclassid = 'pg_class'::regclass
                    AND d.deptype IN ('a', 'i')
                JOIN pg_class t ON t.oid = d.refobjid
                JOIN pg_namespace n ON n.oid = t.relnamespace
                WHERE s.relkind = 'S'
                  AND lower(n.nspname) = lower($1)
                  AND lower(t.relname) = lower($2)
                ORDER BY s.relname
                "#
            }
            ObjectType::Comment => {
                r#"
                SELECT string_agg(stmt, E'\n' ORDER BY ord)
                FROM (
                    SELECT d.objsubid AS ord,
                           CASE WHEN d.objsubid = 0 THEN
                               'COMMENT ON '
                               || CASE c.relkind WHEN 'v' THEN 'VIEW' WHEN 'm' THEN 'MATERIALIZED VIEW' ELSE 'TABLE' END
                               || ' "' || n.nspname || '"."' || c.relname || '" IS '
                               || quote_literal(d.description) || ';'
                           ELSE
                               'COMMENT ON COLUMN "' || n.nspname || '"."' || c.relname || '"."' || a.attname || '" IS '
                               || quote_literal(d.description) || ';'
                           END AS stmt
                    FROM pg_description d
                    JOIN pg_class c ON c.oid = d.objoid AND d.classoid = 'pg_class'::regclass
                    JOIN pg_namespace n ON n.oid = c.relnamespace
                    LEFT JOIN pg_attribute a ON a.attrelid = c.oid AND a.attnum = d.objsubid
                    WHERE lower(n.nspname) = lower($1)
                      AND lower(c.relname) = lower($2)
                ) comments
                "#
            }
            _ => {
                return Err(Error::IntrospectionError(format!(
                    "{} is not a dependent object type",
                    dependent_type
                )))
            }
        };

        if dependent_type == ObjectType::Comment {
            let comments = sqlx::query_scalar::<_, Option<String>>(sql)
                .bind(&self.schema)
                .bind(owner)
                .fetch_one(&self.pool)
                .await?;
            return Ok(comments.into_iter().collect());
        }

        let ddl = sqlx::query_scalar::<_, String>(sql)
            .bind(&self.schema)
            .bind(owner)
            .fetch_all(&self.pool)
            .await?;
        Ok(ddl)
    }
}
