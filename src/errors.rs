use std::fmt;

#[derive(Debug, Clone)]
pub enum MailbeaconError {
    DatabaseConfig(String),
    DatabaseConnection(String),
    DatabaseOperation(String),
    Validation(String),
    NotFound(String),
    Serialization(String),
}

impl MailbeaconError {
    pub fn code(&self) -> &'static str {
        match self {
            MailbeaconError::DatabaseConfig(_) => "E001",
            MailbeaconError::DatabaseConnection(_) => "E002",
            MailbeaconError::DatabaseOperation(_) => "E003",
            MailbeaconError::Validation(_) => "E004",
            MailbeaconError::NotFound(_) => "E005",
            MailbeaconError::Serialization(_) => "E006",
        }
    }

    pub fn error_type(&self) -> &'static str {
        match self {
            MailbeaconError::DatabaseConfig(_) => "Database Configuration Error",
            MailbeaconError::DatabaseConnection(_) => "Database Connection Error",
            MailbeaconError::DatabaseOperation(_) => "Database Operation Error",
            MailbeaconError::Validation(_) => "Validation Error",
            MailbeaconError::NotFound(_) => "Resource Not Found",
            MailbeaconError::Serialization(_) => "Serialization Error",
        }
    }

    pub fn message(&self) -> &str {
        match self {
            MailbeaconError::DatabaseConfig(msg) => msg,
            MailbeaconError::DatabaseConnection(msg) => msg,
            MailbeaconError::DatabaseOperation(msg) => msg,
            MailbeaconError::Validation(msg) => msg,
            MailbeaconError::NotFound(msg) => msg,
            MailbeaconError::Serialization(msg) => msg,
        }
    }

    pub fn format_simple(&self) -> String {
        format!("{}: {}", self.error_type(), self.message())
    }
}

impl fmt::Display for MailbeaconError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format_simple())
    }
}

impl std::error::Error for MailbeaconError {}

impl MailbeaconError {
    pub fn database_config<T: Into<String>>(msg: T) -> Self {
        MailbeaconError::DatabaseConfig(msg.into())
    }

    pub fn database_connection<T: Into<String>>(msg: T) -> Self {
        MailbeaconError::DatabaseConnection(msg.into())
    }

    pub fn database_operation<T: Into<String>>(msg: T) -> Self {
        MailbeaconError::DatabaseOperation(msg.into())
    }

    pub fn validation<T: Into<String>>(msg: T) -> Self {
        MailbeaconError::Validation(msg.into())
    }

    pub fn not_found<T: Into<String>>(msg: T) -> Self {
        MailbeaconError::NotFound(msg.into())
    }

    pub fn serialization<T: Into<String>>(msg: T) -> Self {
        MailbeaconError::Serialization(msg.into())
    }
}

impl From<sea_orm::DbErr> for MailbeaconError {
    fn from(err: sea_orm::DbErr) -> Self {
        MailbeaconError::DatabaseOperation(err.to_string())
    }
}

impl From<serde_json::Error> for MailbeaconError {
    fn from(err: serde_json::Error) -> Self {
        MailbeaconError::Serialization(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, MailbeaconError>;
