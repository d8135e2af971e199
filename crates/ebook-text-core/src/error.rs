use thiserror::Error;

/// Book-level failures raised by the conversion pipeline.
///
/// Structural problems in chapter markup are not errors; the chapter builder
/// logs them and keeps going. Only input that makes the whole book
/// untrustworthy ends up here.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConvertError {
    #[error("style sheet comment opened at byte {offset} is never closed")]
    UnterminatedStyleComment { offset: usize },
}
