/*---------------------------------------------------------------------------------------------
 *  Copyright (c) Microsoft Corporation. All rights reserved.
 *  Licensed under the Apache License, Version 2.0. See LICENSE.txt in the project root for license information.
 *  This software incorporates material from third parties. See NOTICE.txt for details.
 *--------------------------------------------------------------------------------------------*/

use std::{fmt::Display, io::ErrorKind};

use crate::codec_session::LzmaStatus;

pub type Result<T> = std::result::Result<T, XzError>;

#[derive(Debug, Clone)]
pub struct XzError {
    /// standard error code
    exit_code: ExitCode,

    /// raw status reported by the codec engine, if the engine was the source of the failure
    status: Option<LzmaStatus>,

    /// diagnostic message including location. Content should not be relied on.
    message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ExitCode {
    /// caller supplied arguments of the wrong shape
    InvalidParameter = 1,
    /// the codec session could not be constructed, no data was processed
    InitializationFailure = 2,
    /// the engine reported an error after processing had started
    CodecError = 3,
    OutOfMemory = 4,
    ShortRead = 5,
    OsError = 6,
    GeneralFailure = 7,
}

impl ExitCode {
    pub fn as_integer_error_code(self) -> i32 {
        self as i32
    }
}

impl Display for ExitCode {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl Display for XzError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.status {
            Some(status) => write!(
                f,
                "{0}: {1} (lzma status {2} {3:?})",
                self.exit_code,
                self.message,
                status.code(),
                status
            ),
            None => write!(f, "{0}: {1}", self.exit_code, self.message),
        }
    }
}

/// translates std::io::Error into XzError, unwrapping an XzError that crossed a Read/Write boundary
impl From<std::io::Error> for XzError {
    #[track_caller]
    fn from(e: std::io::Error) -> Self {
        match e.downcast::<XzError>() {
            Ok(xe) => xe,
            Err(e) => {
                let caller = std::panic::Location::caller();
                XzError {
                    exit_code: get_io_error_exit_code(&e),
                    status: None,
                    message: format!("error {} at {}", e, caller),
                }
            }
        }
    }
}

/// translates XzError into std::io::Error, which involves putting into a Box and using Other
impl From<XzError> for std::io::Error {
    fn from(e: XzError) -> Self {
        std::io::Error::new(std::io::ErrorKind::Other, e)
    }
}

impl std::error::Error for XzError {}

fn get_io_error_exit_code(e: &std::io::Error) -> ExitCode {
    match e.kind() {
        ErrorKind::UnexpectedEof => ExitCode::ShortRead,
        ErrorKind::OutOfMemory => ExitCode::OutOfMemory,
        ErrorKind::InvalidInput => ExitCode::InvalidParameter,
        _ => ExitCode::OsError,
    }
}

impl XzError {
    pub fn new(exit_code: ExitCode, message: &str) -> XzError {
        XzError {
            exit_code,
            status: None,
            message: message.to_owned(),
        }
    }

    /// session construction was rejected before any bytes were processed
    pub fn initialization(status: LzmaStatus, message: impl Into<String>) -> XzError {
        XzError {
            exit_code: ExitCode::InitializationFailure,
            status: Some(status),
            message: message.into(),
        }
    }

    /// the engine failed after the operation had started producing output
    pub fn codec(status: LzmaStatus, message: impl Into<String>) -> XzError {
        XzError {
            exit_code: ExitCode::CodecError,
            status: Some(status),
            message: message.into(),
        }
    }

    pub fn wrap(exit_code: ExitCode, e: &impl Display) -> XzError {
        XzError {
            exit_code,
            status: None,
            message: e.to_string(),
        }
    }

    pub fn exit_code(&self) -> ExitCode {
        self.exit_code
    }

    /// raw engine status code for initialization and codec failures
    pub fn codec_status(&self) -> Option<LzmaStatus> {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    #[cold]
    #[track_caller]
    fn add_context(&mut self) {
        self.message
            .push_str(&format!("\n at {}", std::panic::Location::caller()));
    }
}

#[cold]
#[track_caller]
pub fn err_exit_code<T>(error_code: ExitCode, message: impl AsRef<str>) -> Result<T> {
    let mut e = XzError::new(error_code, message.as_ref());
    e.add_context();
    Err(e)
}

/// appends the location of the caller to the error message as it propagates
pub trait AddContext<T> {
    fn context(self) -> Result<T>;
    fn with_context<FN: FnOnce() -> String>(self, f: FN) -> Result<T>;
}

impl<T, E: Into<XzError>> AddContext<T> for std::result::Result<T, E> {
    #[track_caller]
    fn context(self) -> Result<T> {
        match self {
            Ok(x) => Ok(x),
            Err(e) => {
                let mut e: XzError = e.into();
                e.add_context();
                Err(e)
            }
        }
    }

    #[track_caller]
    fn with_context<FN: FnOnce() -> String>(self, f: FN) -> Result<T> {
        match self {
            Ok(x) => Ok(x),
            Err(e) => {
                let mut e: XzError = e.into();
                e.message.push_str(&format!("\n {}", f()));
                e.add_context();
                Err(e)
            }
        }
    }
}

#[test]
fn test_error_translation() {
    // test wrapping inside an io error
    fn my_std_error() -> std::result::Result<(), std::io::Error> {
        Err(XzError::codec(LzmaStatus::DataError, "test error").into())
    }

    let e: XzError = my_std_error().unwrap_err().into();
    assert_eq!(e.exit_code, ExitCode::CodecError);
    assert_eq!(e.codec_status(), Some(LzmaStatus::DataError));
    assert_eq!(e.message, "test error");

    // an IO error should be translated into an OsError
    let e: XzError = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found").into();
    assert_eq!(e.exit_code, ExitCode::OsError);
    assert_eq!(e.codec_status(), None);

    let e: XzError = std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "eof").into();
    assert_eq!(e.exit_code, ExitCode::ShortRead);
}

#[test]
fn test_context_appends_location() {
    let r: Result<()> = err_exit_code(ExitCode::InvalidParameter, "bad mode");
    let e = r.context().unwrap_err();

    assert_eq!(e.exit_code(), ExitCode::InvalidParameter);
    assert!(e.message().starts_with("bad mode"));
    assert_eq!(e.message().matches("\n at ").count(), 2);
    assert!(e.message().contains(file!()));
}

#[test]
fn test_display_includes_status() {
    let e = XzError::codec(LzmaStatus::BufError, "truncated");
    assert_eq!(e.to_string(), "CodecError: truncated (lzma status 10 BufError)");

    let e = XzError::new(ExitCode::InvalidParameter, "mode");
    assert_eq!(e.to_string(), "InvalidParameter: mode");
    assert_eq!(e.exit_code().as_integer_error_code(), 1);
}
