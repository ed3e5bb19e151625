/// Options recognized by the import engine. Embedders construct one of these
/// per workflow; the CLI builds it from command-line flags.
#[derive(Debug, Clone)]
pub struct ImportConfig {
    /// Tokenizer delimiter; `None` resolves from the file extension.
    pub delimiter: Option<u8>,
    /// Tokenizer quote character.
    pub quote: u8,
    /// Tokenizer escape character; `None` uses doubled-quote escaping.
    pub escape: Option<u8>,
    /// `Some` forces header presence; `None` lets the preview parser guess.
    pub has_headers: Option<bool>,
    /// Character encoding label (e.g. `utf-8`, `windows-1252`); `None` is UTF-8.
    pub encoding: Option<String>,
    /// Rows per batch delivered to the row consumer.
    pub chunk_size: usize,
    /// Rows surfaced to column previews from the bounded preview read.
    pub preview_row_cap: usize,
    /// Whether the restart action is offered once processing has started.
    pub restartable: bool,
    /// Whether the import-all shortcut is offered from the fields step.
    pub allow_import_all: bool,
    /// Abort a file once more than this many rows fail to map; `None` never aborts.
    pub row_error_limit: Option<usize>,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            delimiter: None,
            quote: b'"',
            escape: None,
            has_headers: None,
            encoding: None,
            chunk_size: 100,
            preview_row_cap: 5,
            restartable: false,
            allow_import_all: false,
            row_error_limit: None,
        }
    }
}
