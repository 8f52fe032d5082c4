//! Worker kinds.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Category of document work a worker process serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkerKind {
    Pdf,
    Editor,
    Image,
    Ocr,
    Office,
    Esign,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown worker kind '{0}' (expected pdf, editor, image, ocr, office or esign)")]
pub struct ParseKindError(pub String);

impl WorkerKind {
    pub const ALL: [WorkerKind; 6] = [
        WorkerKind::Pdf,
        WorkerKind::Editor,
        WorkerKind::Image,
        WorkerKind::Ocr,
        WorkerKind::Office,
        WorkerKind::Esign,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            WorkerKind::Pdf => "pdf",
            WorkerKind::Editor => "editor",
            WorkerKind::Image => "image",
            WorkerKind::Ocr => "ocr",
            WorkerKind::Office => "office",
            WorkerKind::Esign => "esign",
        }
    }
}

impl fmt::Display for WorkerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for WorkerKind {
    type Err = ParseKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        WorkerKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == wanted)
            .ok_or_else(|| ParseKindError(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_parsing() {
        assert_eq!("pdf".parse::<WorkerKind>().unwrap(), WorkerKind::Pdf);
        assert_eq!(" OCR ".parse::<WorkerKind>().unwrap(), WorkerKind::Ocr);
        assert!("combine".parse::<WorkerKind>().is_err());

        for kind in WorkerKind::ALL {
            assert_eq!(kind.to_string().parse::<WorkerKind>().unwrap(), kind);
        }
    }
}
