use std::any::Any;

/// Trait for the errors returned by kdtool's commands. This just sets up the trait bounds that
/// are required, since command entry points only expose a rather opaque boxed error type.
pub trait KdtoolError: std::error::Error + Send + 'static + Any {
    fn as_any(&self) -> &dyn Any;
}
impl<T> KdtoolError for T
where
    T: std::error::Error + Send + 'static + Any,
{
    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub type Error = Box<dyn KdtoolError>;

impl dyn KdtoolError {
    /// convenience function for downcasting the error to a concrete type
    pub fn as_type<T: KdtoolError>(&self) -> Option<&T> {
        let as_any = self.as_any();
        as_any.downcast_ref::<T>()
    }

    /// convenience function for checking whether the error is of the given concrete type.
    /// If `is_type::<MyType>()` returns true, then calling `as_type::<MyType>()` will return
    /// `Some`.
    pub fn is_type<T: KdtoolError>(&self) -> bool {
        let as_any = self.as_any();
        as_any.is::<T>()
    }
}

impl<T> From<T> for Error
where
    T: KdtoolError,
{
    fn from(e: T) -> Error {
        Box::new(e)
    }
}

/// Returns the most helpful one-line message for an error. For api errors that's the message
/// from the api server's response body, or the http reason phrase when there wasn't one.
pub fn describe(err: &dyn KdtoolError) -> String {
    match err.as_type::<crate::client::Error>() {
        Some(client_error) => client_error.message(),
        None => err.to_string(),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::client::{self, ApiError};
    use std::io;

    #[test]
    fn describe_uses_api_message() {
        let err: Error = client::Error::Api(ApiError {
            status: "Failure".to_owned(),
            message: "secrets \"myapp\" is forbidden".to_owned(),
            reason: "Forbidden".to_owned(),
            code: 403,
        })
        .into();
        assert_eq!("secrets \"myapp\" is forbidden", describe(&*err));

        let err: Error = io::Error::new(io::ErrorKind::Other, "boom").into();
        assert_eq!("boom", describe(&*err));
    }

    #[test]
    fn boxed_errors_can_be_downcast() {
        let err: Error = io::Error::new(io::ErrorKind::Other, "boom").into();
        assert!(err.is_type::<io::Error>());
        assert!(!err.is_type::<std::fmt::Error>());
        assert_eq!("boom", err.as_type::<io::Error>().unwrap().to_string());
    }
}
