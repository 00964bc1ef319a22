//! DDL normalization
//!
//! Turns the DDL text extracted from the database into the canonical,
//! diff-friendly form stored in the DDL tree. Each object type maps to an
//! ordered list of pure text steps; tables and views additionally get the
//! DDL of their dependent objects appended.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::DdlConfig;
use crate::error::{Error, Result};
use crate::schema::types::{DbObject, DependentDdl, ObjectType};
use crate::utils::naming::{contains_ignore_case, has_excluded_prefix};

/// Line terminator written to DDL files
pub const LINE_ENDING: &str = "\r\n";

static TERMINATOR_SPACING: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+;").unwrap());
static TRAILING_TERMINATOR_SPACING: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+;$").unwrap());
static TRAILING_SLASH: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+/$").unwrap());
static SLASH_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)\s+/[ \t]*$").unwrap());
static COLUMN_LIST_OPEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n\s+\(").unwrap());
static COLUMN_LIST_CLOSE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+\)").unwrap());
static BROKEN_REFERENCES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\r?\n\s+REFERENCES\s").unwrap());
static TRIGGER_ENABLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)\s*ALTER\s+TRIGGER\s+"[^"]+"\s+ENABLE\s*;\s*$"#).unwrap());
static COMMENT_STATEMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bCOMMENT\s+ON\s").unwrap());
static TABLE_COMMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^COMMENT\s+ON\s+TABLE\s").unwrap());

/// A single text transformation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Line terminators to `\n`
    Lf,
    /// Drop the `"<OWNER>".` qualifier
    StripSchema,
    Trim,
    /// `  ;` to `;` everywhere
    TerminatorSpacing,
    /// `  ;` to `;` at the end of the text only
    TrailingTerminatorSpacing,
    /// Put a final `/` terminator on its own line
    SlashTerminator,
    /// Put every line-ending `/` on its own line
    SlashLines,
    /// Open and close the column list on their own lines
    ColumnListParens,
    TabsToSpaces,
    /// Join a line-broken `REFERENCES` clause to the referencing line
    JoinReferences,
    /// Cut everything after the last quoted identifier and re-terminate
    TruncateAfterLastQuote,
    /// Remove the trailing `ALTER TRIGGER "<name>" ENABLE;`
    DropTriggerEnable,
    /// Line terminators to `\r\n`
    CrLf,
}

/// Steps applied to an object's own DDL
pub fn pipeline(object_type: ObjectType) -> &'static [Step] {
    use Step::*;
    match object_type {
        ObjectType::PackageSpec | ObjectType::PackageBody => {
            &[Lf, StripSchema, Trim, SlashTerminator, CrLf]
        }
        ObjectType::Table => &[
            Lf,
            StripSchema,
            Trim,
            TerminatorSpacing,
            ColumnListParens,
            CrLf,
            TabsToSpaces,
            JoinReferences,
        ],
        ObjectType::View => &[Lf, StripSchema, Trim, TerminatorSpacing, CrLf],
        ObjectType::Index => &[Lf, StripSchema, Trim, TrailingTerminatorSpacing, CrLf],
        ObjectType::Sequence => &[Lf, StripSchema, Trim, TruncateAfterLastQuote, CrLf],
        ObjectType::Trigger => &[Lf, StripSchema, Trim, DropTriggerEnable, SlashLines, CrLf],
        ObjectType::Comment => &[Lf, StripSchema, Trim],
    }
}

/// Convert any mix of line terminators to `\r\n`
pub fn to_crlf(text: &str) -> String {
    to_lf(text).replace('\n', LINE_ENDING)
}

fn to_lf(text: &str) -> String {
    text.replace("\r\n", "\n").replace('\r', "\n")
}

/// Renders normalized DDL for one owner schema
#[derive(Debug, Clone)]
pub struct DdlNormalizer {
    schema_qualifier: Regex,
    excluded_packages: Vec<String>,
    excluded_views: Vec<String>,
    excluded_sequences: Vec<String>,
}

impl DdlNormalizer {
    pub fn new(owner_schema: &str, config: &DdlConfig) -> Result<Self> {
        if owner_schema.trim().is_empty() {
            return Err(Error::ConfigError("Owner schema name is blank".to_string()));
        }
        let schema_qualifier = Regex::new(&format!(r#"(?i)"{}"\."#, regex::escape(owner_schema)))
            .map_err(|e| Error::ConfigError(format!("Invalid owner schema name: {}", e)))?;

        Ok(Self {
            schema_qualifier,
            excluded_packages: config.excluded_packages.clone(),
            excluded_views: config.excluded_views.clone(),
            excluded_sequences: config.excluded_sequences.clone(),
        })
    }

    /// Objects that never get a DDL file
    pub fn is_excluded(&self, object: &DbObject) -> bool {
        match object.object_type {
            ObjectType::PackageSpec | ObjectType::PackageBody => {
                has_excluded_prefix(&object.name, &self.excluded_packages)
            }
            ObjectType::View => has_excluded_prefix(&object.name, &self.excluded_views),
            _ => false,
        }
    }

    /// Run a list of steps over a piece of DDL
    pub fn apply(&self, steps: &[Step], ddl: &str) -> String {
        steps
            .iter()
            .fold(ddl.to_string(), |text, step| self.apply_step(*step, &text))
    }

    fn apply_step(&self, step: Step, text: &str) -> String {
        match step {
            Step::Lf => to_lf(text),
            Step::StripSchema => self.schema_qualifier.replace_all(text, "").into_owned(),
            Step::Trim => text.trim().to_string(),
            Step::TerminatorSpacing => TERMINATOR_SPACING.replace_all(text, ";").into_owned(),
            Step::TrailingTerminatorSpacing => {
                TRAILING_TERMINATOR_SPACING.replace(text, ";").into_owned()
            }
            Step::SlashTerminator => TRAILING_SLASH.replace(text, "\n/").into_owned(),
            Step::SlashLines => SLASH_LINES.replace_all(text, "\n/").into_owned(),
            Step::ColumnListParens => {
                let text = COLUMN_LIST_OPEN.replace(text, "(\n");
                COLUMN_LIST_CLOSE.replace(&text, "\n)").into_owned()
            }
            Step::TabsToSpaces => text.replace('\t', "    "),
            Step::JoinReferences => BROKEN_REFERENCES
                .replace_all(text, " REFERENCES ")
                .into_owned(),
            Step::TruncateAfterLastQuote => match text.rfind('"') {
                Some(index) => format!("{};", &text[..=index]),
                None => TRAILING_TERMINATOR_SPACING.replace(text, ";").into_owned(),
            },
            Step::DropTriggerEnable => TRIGGER_ENABLE.replace(text, "").into_owned(),
            Step::CrLf => to_crlf(text),
        }
    }

    /// Render the file content for an object.
    ///
    /// Returns `None` for excluded objects and for dependent types, which are
    /// only ever rendered inside their owner's file.
    pub fn render(&self, object: &DbObject, dependents: &DependentDdl) -> Option<String> {
        if self.is_excluded(object) {
            return None;
        }
        let mut ddl = match object.object_type {
            ObjectType::PackageSpec | ObjectType::PackageBody | ObjectType::Table | ObjectType::View => {
                self.apply(pipeline(object.object_type), &object.ddl)
            }
            _ => return None,
        };

        match object.object_type {
            ObjectType::Table => {
                ddl.push_str(&self.comment_block(&dependents.comments, true));
                ddl.push_str(&self.index_block(&dependents.indexes));
                ddl.push_str(&self.sequence_block(&dependents.sequences));
                ddl.push_str(&self.trigger_block(&dependents.triggers));
            }
            ObjectType::View => {
                ddl.push_str(&self.comment_block(&dependents.comments, false));
            }
            _ => {}
        }

        Some(ddl)
    }

    /// One blank-line separated group per dependent comment object, each
    /// statement on its own line. With `hoist_table_comment` the
    /// `COMMENT ON TABLE` statement is moved in front of the column comments.
    pub fn comment_block(&self, comments: &[String], hoist_table_comment: bool) -> String {
        let mut block = String::new();
        for raw in comments {
            let text = self.apply(pipeline(ObjectType::Comment), raw);
            let mut statements = split_comment_statements(&text);
            if hoist_table_comment {
                if let Some(pos) = statements.iter().position(|s| TABLE_COMMENT.is_match(s)) {
                    let table_comment = statements.remove(pos);
                    statements.insert(0, table_comment);
                }
            }
            if statements.is_empty() {
                continue;
            }
            block.push_str(LINE_ENDING);
            block.push_str(LINE_ENDING);
            block.push_str(&statements.join(LINE_ENDING));
        }
        block
    }

    /// Index statements, the first one after a blank line
    pub fn index_block(&self, indexes: &[String]) -> String {
        self.list_block(indexes.iter(), ObjectType::Index)
    }

    /// Sequence statements minus the excluded ones, the first one after a blank line
    pub fn sequence_block(&self, sequences: &[String]) -> String {
        let kept = sequences.iter().filter(|raw| {
            let excluded = self
                .excluded_sequences
                .iter()
                .any(|name| contains_ignore_case(raw, name));
            if excluded {
                tracing::debug!("Leaving excluded sequence out of table DDL");
            }
            !excluded
        });
        self.list_block(kept, ObjectType::Sequence)
    }

    /// Trigger definitions, each after a blank line
    pub fn trigger_block(&self, triggers: &[String]) -> String {
        let mut block = String::new();
        for raw in triggers {
            let ddl = self.apply(pipeline(ObjectType::Trigger), raw);
            if ddl.is_empty() {
                continue;
            }
            block.push_str(LINE_ENDING);
            block.push_str(LINE_ENDING);
            block.push_str(&ddl);
        }
        block
    }

    fn list_block<'a>(&self, entries: impl Iterator<Item = &'a String>, object_type: ObjectType) -> String {
        let mut block = String::new();
        for raw in entries {
            let ddl = self.apply(pipeline(object_type), raw);
            if ddl.is_empty() {
                continue;
            }
            if block.is_empty() {
                block.push_str(LINE_ENDING);
            }
            block.push_str(LINE_ENDING);
            block.push_str(&ddl);
        }
        block
    }
}

/// Split comment DDL into single-line `COMMENT ON ...` statements
fn split_comment_statements(text: &str) -> Vec<String> {
    let mut starts: Vec<usize> = COMMENT_STATEMENT.find_iter(text).map(|m| m.start()).collect();
    if starts.first() != Some(&0) {
        starts.insert(0, 0);
    }
    starts.push(text.len());

    starts
        .windows(2)
        .map(|bounds| text[bounds[0]..bounds[1]].replace('\n', "").trim().to_string())
        .filter(|statement| !statement.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn normalizer() -> DdlNormalizer {
        DdlNormalizer::new("app", &DdlConfig::default()).unwrap()
    }

    fn object(name: &str, object_type: ObjectType, ddl: &str) -> DbObject {
        DbObject {
            name: name.to_string(),
            object_type,
            ddl: ddl.to_string(),
        }
    }

    #[test]
    fn test_strip_schema_qualifier() {
        let n = DdlNormalizer::new("FOO", &DdlConfig::default()).unwrap();

        assert_eq!(n.apply(&[Step::StripSchema], r#""FOO"."BAR".baz"#), r#""BAR".baz"#);
        assert_eq!(n.apply(&[Step::StripSchema], r#""foo"."BAR""#), r#""BAR""#);
        assert_eq!(n.apply(&[Step::StripSchema], r#""FOOD"."BAR""#), r#""FOOD"."BAR""#);
    }

    #[test]
    fn test_blank_owner_schema_is_rejected() {
        assert!(DdlNormalizer::new("  ", &DdlConfig::default()).is_err());
    }

    #[rstest]
    #[case(Step::Lf, "a\r\nb\rc", "a\nb\nc")]
    #[case(Step::CrLf, "a\nb\r\nc", "a\r\nb\r\nc")]
    #[case(Step::Trim, "\n  a b \t\n", "a b")]
    #[case(Step::TerminatorSpacing, "a ;\nb\n  ;", "a;\nb;")]
    #[case(Step::TrailingTerminatorSpacing, "a ;\nb\n  ;", "a ;\nb;")]
    #[case(Step::SlashTerminator, "end pkg;\n   /", "end pkg;\n/")]
    #[case(Step::SlashTerminator, "x := a / b;", "x := a / b;")]
    #[case(Step::SlashLines, "end;   /\nalter", "end;\n/\nalter")]
    #[case(Step::ColumnListParens, "CREATE TABLE \"T\" \n   (\t\"A\" NUMBER(1,0)\n   ) ;", "CREATE TABLE \"T\" (\n\t\"A\" NUMBER(1,0)\n) ;")]
    #[case(Step::TabsToSpaces, "\ta\t", "    a    ")]
    #[case(Step::JoinReferences, "KEY (\"A\")\r\n\t  REFERENCES \"B\" (\"ID\")", "KEY (\"A\") REFERENCES \"B\" (\"ID\")")]
    #[case(Step::TruncateAfterLastQuote, "CREATE SEQUENCE  \"S\"  MINVALUE 1 START WITH 42 ;", "CREATE SEQUENCE  \"S\";")]
    #[case(Step::TruncateAfterLastQuote, "CREATE SEQUENCE s START WITH 42 ;", "CREATE SEQUENCE s START WITH 42;")]
    #[case(Step::DropTriggerEnable, "END;\n/\nALTER TRIGGER \"TRG\" ENABLE;", "END;\n/")]
    fn test_steps(#[case] step: Step, #[case] input: &str, #[case] expected: &str) {
        assert_eq!(normalizer().apply(&[step], input), expected);
    }

    #[test]
    fn test_crlf_is_idempotent() {
        let once = to_crlf("a\nb\r\nc");
        assert_eq!(to_crlf(&once), once);
    }

    #[test]
    fn test_package_spec() {
        let raw = "\n  CREATE OR REPLACE PACKAGE \"APP\".\"PKG_ORDERS\" AS\n  procedure submit;\nEND PKG_ORDERS;\n  /\n";
        let ddl = normalizer()
            .render(&object("PKG_ORDERS", ObjectType::PackageSpec, raw), &DependentDdl::default())
            .unwrap();

        assert_eq!(
            ddl,
            "CREATE OR REPLACE PACKAGE \"PKG_ORDERS\" AS\r\n  procedure submit;\r\nEND PKG_ORDERS;\r\n/"
        );
    }

    #[rstest]
    #[case("PKGR_REPORTS", ObjectType::PackageBody)]
    #[case("pkgr_reports", ObjectType::PackageSpec)]
    #[case("VX_HELPER", ObjectType::View)]
    fn test_excluded_objects(#[case] name: &str, #[case] object_type: ObjectType) {
        let n = normalizer();
        let excluded = object(name, object_type, "CREATE ...");

        assert!(n.is_excluded(&excluded));
        assert_eq!(n.render(&excluded, &DependentDdl::default()), None);
    }

    #[test]
    fn test_dependent_types_are_not_rendered_alone() {
        let index = object("IX_T", ObjectType::Index, "CREATE INDEX \"IX_T\" ON \"T\" (\"A\");");
        assert_eq!(normalizer().render(&index, &DependentDdl::default()), None);
    }

    #[test]
    fn test_table_with_dependents() {
        let raw = concat!(
            "\n  CREATE TABLE \"APP\".\"ORDERS\" \n",
            "   (\t\"ID\" NUMBER(10,0) NOT NULL ENABLE, \n",
            "\t\"CUSTOMER_ID\" NUMBER(10,0), \n",
            "\t CONSTRAINT \"FK_ORDERS_CUSTOMER\" FOREIGN KEY (\"CUSTOMER_ID\")\n",
            "\t  REFERENCES \"APP\".\"CUSTOMERS\" (\"ID\") ENABLE\n",
            "   ) ;"
        );
        let dependents = DependentDdl {
            comments: vec![concat!(
                "\n  COMMENT ON COLUMN \"APP\".\"ORDERS\".\"ID\" IS 'Primary key';\n",
                "  COMMENT ON TABLE \"APP\".\"ORDERS\" IS 'Customer orders';\n"
            )
            .to_string()],
            indexes: vec![
                "\n  CREATE INDEX \"APP\".\"IX_ORDERS_CUSTOMER\" ON \"APP\".\"ORDERS\" (\"CUSTOMER_ID\") \n  ;".to_string(),
                "\n  CREATE UNIQUE INDEX \"APP\".\"UX_ORDERS_ID\" ON \"APP\".\"ORDERS\" (\"ID\") ;".to_string(),
            ],
            sequences: vec![
                "\n   CREATE SEQUENCE  \"APP\".\"SEQ_ORDERS_ID\"  MINVALUE 1 INCREMENT BY 1 START WITH 1041 CACHE 20 NOORDER  NOCYCLE ;".to_string(),
            ],
            triggers: vec![concat!(
                "\n  CREATE OR REPLACE TRIGGER \"APP\".\"TRG_ORDERS_BI\" \n",
                "BEFORE INSERT ON orders\nFOR EACH ROW\nBEGIN\n  :new.id := seq_orders_id.nextval;\nEND;\n/\n",
                "ALTER TRIGGER \"APP\".\"TRG_ORDERS_BI\" ENABLE;\n"
            )
            .to_string()],
        };

        let ddl = normalizer()
            .render(&object("ORDERS", ObjectType::Table, raw), &dependents)
            .unwrap();

        let expected = concat!(
            "CREATE TABLE \"ORDERS\" (\r\n",
            "    \"ID\" NUMBER(10,0) NOT NULL ENABLE, \r\n",
            "    \"CUSTOMER_ID\" NUMBER(10,0), \r\n",
            "     CONSTRAINT \"FK_ORDERS_CUSTOMER\" FOREIGN KEY (\"CUSTOMER_ID\") REFERENCES \"CUSTOMERS\" (\"ID\") ENABLE\r\n",
            ");\r\n",
            "\r\n",
            "COMMENT ON TABLE \"ORDERS\" IS 'Customer orders';\r\n",
            "COMMENT ON COLUMN \"ORDERS\".\"ID\" IS 'Primary key';\r\n",
            "\r\n",
            "CREATE INDEX \"IX_ORDERS_CUSTOMER\" ON \"ORDERS\" (\"CUSTOMER_ID\");\r\n",
            "CREATE UNIQUE INDEX \"UX_ORDERS_ID\" ON \"ORDERS\" (\"ID\");\r\n",
            "\r\n",
            "CREATE SEQUENCE  \"SEQ_ORDERS_ID\";\r\n",
            "\r\n",
            "CREATE OR REPLACE TRIGGER \"TRG_ORDERS_BI\" \r\n",
            "BEFORE INSERT ON orders\r\n",
            "FOR EACH ROW\r\n",
            "BEGIN\r\n",
            "  :new.id := seq_orders_id.nextval;\r\n",
            "END;\r\n",
            "/"
        );
        assert_eq!(ddl, expected);
    }

    #[test]
    fn test_excluded_sequence_is_left_out() {
        let sequences = vec![
            "CREATE SEQUENCE \"APP\".\"SEQ_BPD_ITEMS_UNIT_ID\" START WITH 7 ;".to_string(),
            "CREATE SEQUENCE \"APP\".\"SEQ_BPD_ITEMS_ID\" START WITH 9 ;".to_string(),
        ];

        let block = normalizer().sequence_block(&sequences);

        assert_eq!(block, "\r\n\r\nCREATE SEQUENCE \"SEQ_BPD_ITEMS_ID\";");
        assert!(!block.contains("SEQ_BPD_ITEMS_UNIT_ID"));
    }

    #[test]
    fn test_all_sequences_excluded_leaves_no_block() {
        let sequences = vec!["CREATE SEQUENCE \"seq_bpd_items_unit_id\" ;".to_string()];
        assert_eq!(normalizer().sequence_block(&sequences), "");
    }

    #[test]
    fn test_view_with_comments() {
        let raw = "\n  CREATE OR REPLACE FORCE VIEW \"APP\".\"V_ORDERS\" (\"ID\") AS \n  select id from orders\n ;";
        let dependents = DependentDdl {
            comments: vec![concat!(
                "\n  COMMENT ON COLUMN \"APP\".\"V_ORDERS\".\"ID\" IS 'Order id';\n",
                "  COMMENT ON TABLE \"APP\".\"V_ORDERS\" IS 'Orders view';\n"
            )
            .to_string()],
            ..DependentDdl::default()
        };

        let ddl = normalizer()
            .render(&object("V_ORDERS", ObjectType::View, raw), &dependents)
            .unwrap();

        assert_eq!(
            ddl,
            concat!(
                "CREATE OR REPLACE FORCE VIEW \"V_ORDERS\" (\"ID\") AS \r\n",
                "  select id from orders;\r\n",
                "\r\n",
                "COMMENT ON COLUMN \"V_ORDERS\".\"ID\" IS 'Order id';\r\n",
                "COMMENT ON TABLE \"V_ORDERS\" IS 'Orders view';"
            )
        );
    }

    #[test]
    fn test_comment_statements_split() {
        let text = "COMMENT ON TABLE \"T\" IS 'a';   comment on column \"T\".\"A\" IS 'multi\nline';";

        assert_eq!(
            split_comment_statements(text),
            vec![
                "COMMENT ON TABLE \"T\" IS 'a';".to_string(),
                "comment on column \"T\".\"A\" IS 'multiline';".to_string(),
            ]
        );
    }

    #[test]
    fn test_render_is_deterministic() {
        let n = normalizer();
        let table = object("T", ObjectType::Table, "CREATE TABLE \"APP\".\"T\" \n   (\t\"A\" NUMBER\n   ) ;");
        let dependents = DependentDdl {
            indexes: vec!["CREATE INDEX \"APP\".\"IX_T\" ON \"APP\".\"T\" (\"A\") ;".to_string()],
            ..DependentDdl::default()
        };

        assert_eq!(n.render(&table, &dependents), n.render(&table, &dependents));
    }
}
