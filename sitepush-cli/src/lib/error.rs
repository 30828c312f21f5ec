use std::fmt;

pub fn api<E: fmt::Display>(err: E) -> sitepush::Error {
    sitepush::Error::Api(err.to_string())
}

pub fn auth<E: fmt::Display>(err: E) -> sitepush::Error {
    sitepush::Error::Auth(err.to_string())
}

pub fn bug<E: fmt::Display>(err: E) -> sitepush::Error {
    sitepush::Error::Bug(err.to_string())
}
