use serde::{Deserialize, Serialize};

/// JSON envelope shared by every HTTP response.
#[derive(Debug, Serialize, Deserialize)]
pub struct HttpResponse<T> {
    pub code: i32,
    pub message: String,
    pub data: T,
}

impl<T> HttpResponse<T> {
    pub fn new(code: i32, message: String, data: T) -> Self {
        Self { code, message, data }
    }
}
