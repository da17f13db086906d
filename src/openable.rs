use crate::error::CloseError;

/// A handle the autoclose policy can close.
/// A failed close means the resource is still open and must stay registered.
pub trait Openable {
    fn close(&mut self) -> Result<(), CloseError>;
}

impl<T: Openable + ?Sized> Openable for Box<T> {
    fn close(&mut self) -> Result<(), CloseError> { (**self).close() }
}
