//! Build QR code images, optionally recolored or with a logo on top, that are
//! guaranteed to still scan.
//!
//! ```no_run
//! use decorated_qr::{new_qr_code, Decoration};
//! use image::Rgba;
//!
//! # fn main() -> decorated_qr::Result<()> {
//! let image = new_qr_code()
//!     .with_size(250, 250)?
//!     .with_data("HELLO")?
//!     .decorate(Decoration::recolor(Rgba([200, 0, 0, 255])))?
//!     .to_image();
//! assert_eq!(image.dimensions(), (250, 250));
//! # Ok(())
//! # }
//! ```

pub mod builder;
pub mod decorate;
pub mod error;
pub mod guard;
pub mod qr;

pub use builder::{new_qr_code, QrBuilder};
pub use decorate::{Decoration, Overlay};
pub use error::{DecodeFailure, EncodingError, Error, Result, Unreadable};
pub use guard::{decode, ScanAssessment, ScanGuard};
pub use qr::{encode, EncodeOptions, SymbolLayout};
pub use qrcode::EcLevel;
