use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of payload a chat message carries. Non-text kinds store an asset URL
/// in `content`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    #[sea_orm(string_value = "text")]
    Text,
    #[sea_orm(string_value = "image")]
    Image,
    #[sea_orm(string_value = "video")]
    Video,
    #[sea_orm(string_value = "pdf")]
    Pdf,
    #[sea_orm(string_value = "voice")]
    Voice,
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MessageType::Text => "text",
            MessageType::Image => "image",
            MessageType::Video => "video",
            MessageType::Pdf => "pdf",
            MessageType::Voice => "voice",
        };
        f.write_str(s)
    }
}

impl FromStr for MessageType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(MessageType::Text),
            "image" => Ok(MessageType::Image),
            "video" => Ok(MessageType::Video),
            "pdf" => Ok(MessageType::Pdf),
            "voice" => Ok(MessageType::Voice),
            other => Err(format!("unknown message type '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Text")]
pub enum NoteType {
    #[default]
    #[sea_orm(string_value = "Lecture")]
    Lecture,
    #[sea_orm(string_value = "Assignment")]
    Assignment,
    #[sea_orm(string_value = "Personal")]
    Personal,
    #[sea_orm(string_value = "Reference")]
    Reference,
}

impl fmt::Display for NoteType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl FromStr for NoteType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "Lecture" => Ok(NoteType::Lecture),
            "Assignment" => Ok(NoteType::Assignment),
            "Personal" => Ok(NoteType::Personal),
            "Reference" => Ok(NoteType::Reference),
            other => Err(format!("unknown note type '{other}'")),
        }
    }
}

/// How a note entered the library. Duplicate detection is scoped per source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "lowercase")]
pub enum NoteSource {
    #[sea_orm(string_value = "upload")]
    Upload,
    #[sea_orm(string_value = "chat")]
    Chat,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_type_parses_case_insensitively() {
        assert_eq!("Voice".parse::<MessageType>().unwrap(), MessageType::Voice);
        assert_eq!(" pdf ".parse::<MessageType>().unwrap(), MessageType::Pdf);
        assert!("gif".parse::<MessageType>().is_err());
    }

    #[test]
    fn note_type_serializes_with_capitalized_names() {
        let json = serde_json::to_string(&NoteType::Assignment).unwrap();
        assert_eq!(json, "\"Assignment\"");
        assert!("lecture".parse::<NoteType>().is_err());
        assert_eq!(NoteType::default(), NoteType::Lecture);
    }
}
