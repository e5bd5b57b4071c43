use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Everything a build can fail with, reported at the builder step that detected it.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid size {width}x{height}: width and height must both be positive")]
    InvalidSize { width: u32, height: u32 },

    #[error("decoration left the code unreadable: {reason}")]
    UnreadableData { reason: Unreadable },

    #[error(transparent)]
    Encoding(#[from] EncodingError),
}

#[derive(Debug, Error)]
pub enum EncodingError {
    #[error("failed to generate QR code: {0}")]
    Symbol(#[from] qrcode::types::QrError),

    #[error("a {width}x{height} canvas cannot hold a symbol needing {required}x{required} pixels")]
    DoesNotFit {
        width: u32,
        height: u32,
        required: u32,
    },
}

/// Why a decorated bitmap was rejected.
#[derive(Debug, Clone, PartialEq)]
pub enum Unreadable {
    NoSymbol,
    Corrupt(String),
    PayloadMismatch { decoded: String },
    LossBudgetExceeded { loss: f32, budget: f32 },
}

impl std::fmt::Display for Unreadable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Unreadable::NoSymbol => write!(f, "no symbol found"),
            Unreadable::Corrupt(detail) => write!(f, "symbol could not be decoded ({detail})"),
            Unreadable::PayloadMismatch { decoded } => {
                write!(f, "symbol decodes to a different payload ({} bytes)", decoded.len())
            }
            Unreadable::LossBudgetExceeded { loss, budget } => write!(
                f,
                "{:.1}% of modules changed, budget is {:.1}%",
                loss * 100.0,
                budget * 100.0
            ),
        }
    }
}

/// Failure of the standalone decoder.
#[derive(Debug, Error)]
pub enum DecodeFailure {
    #[error("no QR symbol found in image")]
    NoSymbol,

    #[error("symbol could not be decoded: {0:?}")]
    Corrupt(rqrr::DeQRError),
}

impl From<DecodeFailure> for Unreadable {
    fn from(failure: DecodeFailure) -> Self {
        match failure {
            DecodeFailure::NoSymbol => Unreadable::NoSymbol,
            DecodeFailure::Corrupt(err) => Unreadable::Corrupt(format!("{err:?}")),
        }
    }
}
