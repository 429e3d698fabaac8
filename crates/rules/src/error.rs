use std::fmt;

#[derive(Debug)]
pub enum RulesError {
    /// TOML parse / deserialization error.
    ConfigParse(String),
    /// Config validation error (non-positive fare, rate out of range, etc.).
    ConfigValidation(String),
    /// Column configuration cannot produce a dataset.
    ColumnConfig(String),
    /// IO error (file read, etc.).
    Io(String),
}

impl fmt::Display for RulesError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigParse(msg) => write!(f, "config parse error: {msg}"),
            Self::ConfigValidation(msg) => write!(f, "config validation error: {msg}"),
            Self::ColumnConfig(msg) => write!(f, "column config error: {msg}"),
            Self::Io(msg) => write!(f, "IO error: {msg}"),
        }
    }
}

impl std::error::Error for RulesError {}

/// Why an uploaded file was not accepted
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadError {
    /// No column containing "адрес"
    NoAddressColumn { file: String },
    /// Address column present but no row names the expected city
    CityNotFound { file: String, city: String },
    /// Partner file without a "партнер" column
    NoPartnerColumn { file: String },
    /// Partner file without an order-number column
    NoOrderColumn { file: String },
}

impl fmt::Display for UploadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoAddressColumn { file } => write!(f, "{file}: no address column"),
            Self::CityNotFound { file, city } => {
                write!(f, "{file}: no addresses mention the city '{city}'")
            }
            Self::NoPartnerColumn { file } => write!(f, "{file}: partner file has no 'Партнер' column"),
            Self::NoOrderColumn { file } => write!(f, "{file}: partner file has no 'Номер заказа' column"),
        }
    }
}

impl std::error::Error for UploadError {}
