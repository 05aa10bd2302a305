use clap::Parser;

/// This is the voter roster import program of the PEMIRA platform.
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// (file path) The spreadsheet containing the voters: .xlsx, .xls or .csv.
    #[clap(short, long, value_parser)]
    pub input: Option<String>,

    /// (file path, optional) A JSON configuration file. See the manual for the accepted keys.
    /// Options passed on the command line take precedence over the file.
    #[clap(short, long, value_parser)]
    pub config: Option<String>,

    /// (default: the first sheet) The name of the worksheet to import.
    #[clap(long, value_parser)]
    pub sheet: Option<String>,

    /// The header of the column holding the NIM. Detected from the headers if not provided.
    #[clap(long, value_parser)]
    pub nim_column: Option<String>,

    /// The header of the column holding the full name. Detected if not provided.
    #[clap(long, value_parser)]
    pub name_column: Option<String>,

    /// The header of the column holding the email. An empty value disables the column.
    #[clap(long, value_parser)]
    pub email_column: Option<String>,

    /// The header of the column holding the batch. An empty value disables the column.
    #[clap(long, value_parser)]
    pub batch_column: Option<String>,

    /// (repeatable) A batch whose voters vote at a physical station.
    #[clap(long, value_parser)]
    pub offline: Vec<String>,

    /// (repeatable) A batch whose voters vote through the web flow. This is the default.
    #[clap(long, value_parser)]
    pub online: Vec<String>,

    /// If specified, only the rows whose NIM or name contain this text are imported.
    #[clap(long, value_parser)]
    pub filter: Option<String>,

    /// (repeatable) A NIM to leave out of the import.
    #[clap(long, value_parser)]
    pub exclude: Vec<String>,

    /// (url) The backend import endpoint.
    #[clap(long, value_parser)]
    pub endpoint: Option<String>,

    /// The API token. Can also be set with the PEMIRA_API_TOKEN environment variable.
    #[clap(long, value_parser)]
    pub token: Option<String>,

    /// (file path, 'stdout', or empty for no output) If specified, the import payload
    /// will be written in JSON format to the given location.
    #[clap(short, long, value_parser)]
    pub out: Option<String>,

    /// (file path) A reference payload in JSON format. If provided, the generated payload is
    /// checked against it.
    #[clap(short, long, value_parser)]
    pub reference: Option<String>,

    /// Builds and checks the payload without calling the backend.
    #[clap(long, takes_value = false)]
    pub dry_run: bool,

    // Other arguments
    /// If passed as an argument, will turn on verbose logging to the standard output.
    #[clap(long, takes_value = false)]
    pub verbose: bool,
}
