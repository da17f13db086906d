use super::*;

#[test]
fn descriptor_error_codes() {
    assert_eq!(DescriptorError::InvalidBounds { min: 3.0, max: 1.0 }.code(), "invalid_bounds");
    assert_eq!(DescriptorError::InvalidThreshold(-2.0).code(), "invalid_threshold");
    assert_eq!(DescriptorError::InvalidDuration("soon".into()).code(), "invalid_duration");
    let open = DescriptorError::Open { path: PathBuf::from("/nope"), source: io::Error::from(io::ErrorKind::NotFound) };
    assert_eq!(open.code(), "open_failed");
    assert_eq!(DescriptorError::from(io::Error::from(io::ErrorKind::Other)).code(), "io");
}

#[test]
fn configuration_errors_are_flagged() {
    assert!(DescriptorError::InvalidBounds { min: 2.0, max: 1.0 }.is_configuration());
    assert!(DescriptorError::InvalidThreshold(f64::NAN).is_configuration());
    assert!(!DescriptorError::Io(io::Error::from(io::ErrorKind::Other)).is_configuration());
}

#[test]
fn messages_name_the_offending_values() {
    let msg = DescriptorError::InvalidBounds { min: 4.0, max: 2.0 }.to_string();
    assert!(msg.contains("min=4"));
    assert!(msg.contains("max=2"));

    let msg = CloseError::AlreadyClosed("/tmp/a".into()).to_string();
    assert_eq!(msg, "descriptor already closed: /tmp/a");
}

#[test]
fn close_error_codes() {
    assert_eq!(CloseError::AlreadyClosed("x".into()).code(), "already_closed");
    assert_eq!(CloseError::Other("boom".into()).code(), "close_failed");
    let io = CloseError::Io { path: PathBuf::from("/x"), source: io::Error::from(io::ErrorKind::Other) };
    assert_eq!(io.code(), "close_io");
}
