use crate::resources::error::{Error, ReadAnswer, RenderJson, RenderYaml};
use prettytable::{format, Row, Table};
use serde::ser;
use snafu::ResultExt;

const CELL_NO_CONTENT: &str = "---";

/// Optional cells should display `CELL_NO_CONTENT` if None.
pub fn optional_cell<T: ToString>(field: Option<T>) -> String {
    field
        .map(|f| f.to_string())
        .unwrap_or_else(|| CELL_NO_CONTENT.to_string())
}

// Constants to store the table headers of the Tabular output formats.
lazy_static! {
    pub static ref RBD_IMAGE_HEADERS: Row = row!["poolName", "imageName", "namespace"];
    pub static ref SUBVOLUME_HEADERS: Row =
        row!["Filesystem", "Subvolume", "SubvolumeGroup", "State"];
}

// table_printer takes the above defined headers and the rows created at execution,
// to create a Tabular output and prints to the stdout.
pub fn table_printer(titles: Row, rows: Vec<Row>) {
    let mut table = Table::new();
    // FORMAT_CLEAN has been set to remove table borders
    table.set_format(*format::consts::FORMAT_CLEAN);
    table.set_titles(titles);
    for row in rows {
        table.add_row(row);
    }
    table.printstd();
}

// CreateRows trait to be implemented by Vec<`resource`> to create the rows.
pub trait CreateRows {
    fn create_rows(&self) -> Vec<Row>;
}

// GetHeaderRow trait to be implemented by Vec<`resource`> to fetch the corresponding headers.
pub trait GetHeaderRow {
    fn get_header_row(&self) -> Row;
}

// OutputFormat to be used as an enum to match the output from args.
#[derive(Debug, Clone, Copy, PartialEq, strum_macros::EnumString, strum_macros::AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum OutputFormat {
    Table,
    Yaml,
    Json,
}

impl<T> CreateRows for Vec<T>
where
    T: CreateRows,
{
    fn create_rows(&self) -> Vec<Row> {
        self.iter().flat_map(|i| i.create_rows()).collect()
    }
}

impl<T> GetHeaderRow for Vec<T>
where
    T: GetHeaderRow,
{
    fn get_header_row(&self) -> Row {
        self.get(0)
            .map(GetHeaderRow::get_header_row)
            .unwrap_or_default()
    }
}

/// Render a serializable value in the given format, tables are not supported here.
pub fn render<T: ser::Serialize>(
    output: &OutputFormat,
    name: &str,
    obj: &T,
) -> Result<String, Error> {
    match output {
        OutputFormat::Json => serde_json::to_string_pretty(obj).context(RenderJson { name }),
        OutputFormat::Yaml | OutputFormat::Table => {
            serde_yaml::to_string(obj).context(RenderYaml { name })
        }
    }
}

pub fn print_table<T>(output: &OutputFormat, obj: T) -> Result<(), Error>
where
    T: ser::Serialize,
    T: CreateRows,
    T: GetHeaderRow,
{
    match output {
        OutputFormat::Table => {
            let rows: Vec<Row> = obj.create_rows();
            let header: Row = obj.get_header_row();
            table_printer(header, rows);
        }
        _ => println!("{}", render(output, "table", &obj)?),
    }
    Ok(())
}

/// Whether interactive confirmations were disabled through the environment.
pub fn prompts_skipped() -> bool {
    std::env::var(utils::SKIP_PROMPTS_ENV)
        .map(|value| value == "true")
        .unwrap_or(false)
}

/// Compare the operator's answer against the expected one.
pub fn check_answer(expected: &str, answer: &str) -> Result<(), Error> {
    if answer == expected {
        return Ok(());
    }
    Err(Error::PromptCancelled {
        expected: expected.to_string(),
        answer: answer.to_string(),
    })
}

/// Ask the operator to type `expected` before going any further.
/// The question is logged as a warning and the first word typed on stdin is the answer.
pub fn confirm(question: &str, expected: &str) -> Result<(), Error> {
    tracing::warn!("{question}");
    if prompts_skipped() {
        tracing::info!("skipping the prompt, {} is set", utils::SKIP_PROMPTS_ENV);
        return Ok(());
    }
    let mut line = String::new();
    std::io::stdin().read_line(&mut line).context(ReadAnswer)?;
    let answer = line.split_whitespace().next().unwrap_or_default();
    check_answer(expected, answer)
}

/// Remove the go toolchain lines from the `rook version` output.
pub fn trim_go_version(rook_version: &str) -> String {
    rook_version
        .lines()
        .filter(|line| !line.contains("go: go"))
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

/// Whether the rook version is an alpha or beta release.
pub fn is_pre_release(rook_version: &str) -> bool {
    rook_version.contains("alpha") || rook_version.contains("beta")
}
