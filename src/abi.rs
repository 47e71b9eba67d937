//! Purpose: C ABI bridge for non-Rust callers of the record channel (libtabchannel).
//! Exports: C-callable channel functions plus string/error free helpers.
//! Role: Stable ABI surface; mode is passed as legacy flag bits (READ = 1, WRITE = 2).
//! Invariants: Opaque handles; every allocation returned has an explicit free function.
//! Invariants: Open failures stay masked (return 0); only unknown mode bits fail `open`.
//! Invariants: Error kinds map 1:1 with `to_exit_code`.
use crate::core::channel::RecordChannel;
use crate::core::error::{Error, ErrorKind, to_exit_code};
use crate::core::mode::ModeFlags;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::path::PathBuf;
use std::ptr;

#[repr(C)]
pub struct tabch_channel {
    channel: RecordChannel,
}

#[repr(C)]
pub struct tabch_error {
    pub kind: i32,
    pub message: *mut c_char,
    pub path: *mut c_char,
}

#[unsafe(no_mangle)]
pub extern "C" fn tabch_channel_new(
    out_channel: *mut *mut tabch_channel,
    out_err: *mut *mut tabch_error,
) -> i32 {
    if out_channel.is_null() {
        return fail(
            out_err,
            Error::new(ErrorKind::Usage).with_message("out_channel is null"),
        );
    }
    let handle = Box::new(tabch_channel {
        channel: RecordChannel::new(),
    });
    unsafe {
        *out_channel = Box::into_raw(handle);
    }
    0
}

/// Disposes the channel (flushing output) and frees the handle.
#[unsafe(no_mangle)]
pub extern "C" fn tabch_channel_free(channel: *mut tabch_channel) {
    if channel.is_null() {
        return;
    }
    unsafe {
        drop(Box::from_raw(channel));
    }
}

#[unsafe(no_mangle)]
pub extern "C" fn tabch_channel_open(
    channel: *mut tabch_channel,
    path: *const c_char,
    mode_flags: u32,
    out_err: *mut *mut tabch_error,
) -> i32 {
    let channel = match borrow_channel(channel, out_err) {
        Ok(channel) => channel,
        Err(code) => return code,
    };
    let path = match parse_str(path, "path") {
        Ok(path) => PathBuf::from(path),
        Err(err) => return fail(out_err, err),
    };
    match channel.channel.open_flags(&path, ModeFlags(mode_flags)) {
        Ok(()) => 0,
        Err(err) => fail(out_err, err),
    }
}

#[unsafe(no_mangle)]
pub extern "C" fn tabch_channel_write(
    channel: *mut tabch_channel,
    fields: *const *const c_char,
    fields_len: usize,
    out_err: *mut *mut tabch_error,
) -> i32 {
    let channel = match borrow_channel(channel, out_err) {
        Ok(channel) => channel,
        Err(code) => return code,
    };
    let fields = match parse_fields(fields, fields_len) {
        Ok(fields) => fields,
        Err(err) => return fail(out_err, err),
    };
    match channel.channel.write(&fields) {
        Ok(()) => 0,
        Err(err) => fail(out_err, err),
    }
}

/// Reads one record.
///
/// `*out_has_record` is 1 when a record was read. Absent columns come back as
/// null; present ones must be released with `tabch_string_free`.
///
/// A column containing a NUL byte cannot cross the ABI: the call fails with a
/// usage error and the line is still consumed, so the next read moves on.
#[unsafe(no_mangle)]
pub extern "C" fn tabch_channel_read(
    channel: *mut tabch_channel,
    out_column1: *mut *mut c_char,
    out_column2: *mut *mut c_char,
    out_has_record: *mut u8,
    out_err: *mut *mut tabch_error,
) -> i32 {
    let channel = match borrow_channel(channel, out_err) {
        Ok(channel) => channel,
        Err(code) => return code,
    };
    if out_column1.is_null() || out_column2.is_null() || out_has_record.is_null() {
        return fail(
            out_err,
            Error::new(ErrorKind::Usage).with_message("read out-parameters must not be null"),
        );
    }
    let mut column1 = None;
    let mut column2 = None;
    let has_record = match channel.channel.read_into(&mut column1, &mut column2) {
        Ok(has_record) => has_record,
        Err(err) => return fail(out_err, err),
    };
    let first = match column1.as_deref().map(column_c_string).transpose() {
        Ok(value) => value.unwrap_or(ptr::null_mut()),
        Err(err) => return fail(out_err, err),
    };
    let second = match column2.as_deref().map(column_c_string).transpose() {
        Ok(value) => value.unwrap_or(ptr::null_mut()),
        Err(err) => {
            tabch_string_free(first);
            return fail(out_err, err);
        }
    };
    unsafe {
        *out_column1 = first;
        *out_column2 = second;
        *out_has_record = u8::from(has_record);
    }
    0
}

#[unsafe(no_mangle)]
pub extern "C" fn tabch_channel_close(
    channel: *mut tabch_channel,
    out_err: *mut *mut tabch_error,
) -> i32 {
    let channel = match borrow_channel(channel, out_err) {
        Ok(channel) => channel,
        Err(code) => return code,
    };
    match channel.channel.close() {
        Ok(()) => 0,
        Err(err) => fail(out_err, err),
    }
}

#[unsafe(no_mangle)]
pub extern "C" fn tabch_string_free(value: *mut c_char) {
    if value.is_null() {
        return;
    }
    unsafe {
        drop(CString::from_raw(value));
    }
}

#[unsafe(no_mangle)]
pub extern "C" fn tabch_error_free(err: *mut tabch_error) {
    if err.is_null() {
        return;
    }
    unsafe {
        let err = Box::from_raw(err);
        if !err.message.is_null() {
            drop(CString::from_raw(err.message));
        }
        if !err.path.is_null() {
            drop(CString::from_raw(err.path));
        }
    }
}

fn borrow_channel<'a>(
    channel: *mut tabch_channel,
    out_err: *mut *mut tabch_error,
) -> Result<&'a mut tabch_channel, i32> {
    if channel.is_null() {
        return Err(fail(
            out_err,
            Error::new(ErrorKind::Usage).with_message("channel is null"),
        ));
    }
    unsafe { Ok(&mut *channel) }
}

fn parse_str<'a>(input: *const c_char, name: &str) -> Result<&'a str, Error> {
    if input.is_null() {
        return Err(Error::new(ErrorKind::Usage).with_message(format!("{name} is null")));
    }
    unsafe { CStr::from_ptr(input) }.to_str().map_err(|err| {
        Error::new(ErrorKind::Usage)
            .with_message(format!("{name} is not valid UTF-8"))
            .with_source(err)
    })
}

fn parse_fields<'a>(fields: *const *const c_char, len: usize) -> Result<Vec<&'a str>, Error> {
    if len == 0 {
        return Ok(Vec::new());
    }
    if fields.is_null() {
        return Err(Error::new(ErrorKind::Usage).with_message("fields is null"));
    }
    let raw = unsafe { std::slice::from_raw_parts(fields, len) };
    raw.iter()
        .enumerate()
        .map(|(index, field)| parse_str(*field, &format!("fields[{index}]")))
        .collect()
}

fn column_c_string(value: &str) -> Result<*mut c_char, Error> {
    CString::new(value).map(CString::into_raw).map_err(|err| {
        Error::new(ErrorKind::Usage)
            .with_message("record column contains a NUL byte")
            .with_source(err)
    })
}

fn fail(out_err: *mut *mut tabch_error, err: Error) -> i32 {
    if out_err.is_null() {
        return -1;
    }
    let error = Box::new(tabch_error {
        kind: to_exit_code(err.kind()),
        message: to_c_string(err.message().unwrap_or("")),
        path: err
            .path()
            .map(|path| to_c_string(path.to_string_lossy().as_ref()))
            .unwrap_or(ptr::null_mut()),
    });
    unsafe {
        *out_err = Box::into_raw(error);
    }
    -1
}

fn to_c_string(input: &str) -> *mut c_char {
    CString::new(input)
        .map(|s| s.into_raw())
        .unwrap_or(ptr::null_mut())
}
