// Copyright 2025 Crrow
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Status codes and layered error reporting for the queue service.
//!
//! Service-level errors implement [`ErrorExt`] so that a handler can turn any
//! of them into an HTTP status and a client-safe message without knowing the
//! concrete error type.

use std::{any::Any, error::Error as StdError, sync::Arc};

use http::StatusCode as HttpStatusCode;
use serde::Serialize;
use strum::EnumProperty;

/// Coarse classification of a failure, carried in API error bodies.
#[derive(
    Clone,
    Copy,
    Debug,
    Eq,
    PartialEq,
    Serialize,
    strum_macros::EnumProperty,
    strum_macros::EnumString,
    strum_macros::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum StatusCode {
    #[strum(props(http_status = "400"))]
    InvalidArgument,
    #[strum(props(http_status = "404"))]
    NotFound,
    #[strum(props(http_status = "405"))]
    MethodNotAllowed,
    #[strum(props(http_status = "413"))]
    PayloadTooLarge,
    #[strum(props(http_status = "503"))]
    Unavailable,
    #[strum(props(http_status = "500"))]
    Internal,
    #[strum(props(http_status = "500"))]
    Unknown,
}

impl StatusCode {
    pub fn http_status(self) -> HttpStatusCode {
        self.get_str("http_status")
            .and_then(|value| value.parse::<u16>().ok())
            .and_then(|value| HttpStatusCode::from_u16(value).ok())
            .unwrap_or(HttpStatusCode::INTERNAL_SERVER_ERROR)
    }

    /// Whether the message of an error with this code may be shown to a
    /// remote caller as-is.
    pub const fn is_client_visible(self) -> bool {
        !matches!(self, Self::Internal | Self::Unknown)
    }
}

pub trait StackError: StdError {
    fn debug_fmt(&self, layer: usize, buf: &mut Vec<String>);

    fn next(&self) -> Option<&dyn StackError>;

    fn last(&self) -> &dyn StackError
    where
        Self: Sized,
    {
        let Some(mut result) = self.next() else {
            return self;
        };
        while let Some(err) = result.next() {
            result = err;
        }
        result
    }

    fn transparent(&self) -> bool { false }
}

pub trait ErrorExt: StackError {
    fn status_code(&self) -> StatusCode { StatusCode::Unknown }

    fn as_any(&self) -> &dyn Any;

    /// Message safe to hand to a remote caller. Internal failures collapse to
    /// a generic line so paths and transport details stay in the logs.
    fn output_msg(&self) -> String
    where
        Self: Sized,
    {
        let code = self.status_code();
        if !code.is_client_visible() {
            return format!("Internal error: {code}");
        }
        let error = self.last();
        if let Some(external_error) = error.source() {
            let mut root = external_error;
            while let Some(source) = root.source() {
                root = source;
            }
            if error.transparent() {
                format!("{root}")
            } else {
                format!("{error}: {root}")
            }
        } else {
            format!("{error}")
        }
    }

    fn root_cause(&self) -> Option<&dyn StdError>
    where
        Self: Sized,
    {
        let error = self.last();
        let mut source = error.source()?;
        while let Some(next) = source.source() {
            source = next;
        }
        Some(source)
    }

    /// Renders every layer of the error stack, outermost first.
    fn stack_trace(&self) -> Vec<String>
    where
        Self: Sized,
    {
        let mut buf = Vec::new();
        self.debug_fmt(0, &mut buf);
        buf
    }
}

impl<T: ?Sized + StackError> StackError for Arc<T> {
    fn debug_fmt(&self, layer: usize, buf: &mut Vec<String>) { self.as_ref().debug_fmt(layer, buf) }

    fn next(&self) -> Option<&dyn StackError> { self.as_ref().next() }
}

impl<T: StackError> StackError for Box<T> {
    fn debug_fmt(&self, layer: usize, buf: &mut Vec<String>) { self.as_ref().debug_fmt(layer, buf) }

    fn next(&self) -> Option<&dyn StackError> { self.as_ref().next() }
}
