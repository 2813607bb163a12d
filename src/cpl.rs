//! Wrappers for GDAL's CPL string lists.

use std::ffi::CString;
use std::ptr;

use gdal_sys::{CSLAddString, CSLCount, CSLDestroy, CSLFetchNameValue, CSLSetNameValue};
use libc::c_char;

use crate::errors::{BridgeError, Result};
use crate::utils::_string;

/// Wraps a `char **papszStrList`, the null-terminated array of
/// `KEY=VALUE`-formatted strings GDAL uses for option lists.
pub struct CslStringList {
    list_ptr: *mut *mut c_char,
}

impl CslStringList {
    pub fn new() -> Self {
        Self {
            list_ptr: ptr::null_mut(),
        }
    }

    /// Assigns `value` to `name`, overwriting duplicate `name`s.
    pub fn set_name_value(&mut self, name: &str, value: &str) -> Result<()> {
        if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(BridgeError::BadArgument {
                name: "name",
                message: format!("invalid characters in option name: '{name}'"),
            });
        }
        if value.contains(|c| c == '\n' || c == '\r') {
            return Err(BridgeError::BadArgument {
                name: "value",
                message: format!("invalid characters in option value: '{value}'"),
            });
        }
        let psz_name = CString::new(name)?;
        let psz_value = CString::new(value)?;
        unsafe {
            self.list_ptr = CSLSetNameValue(self.list_ptr, psz_name.as_ptr(), psz_value.as_ptr());
        }
        Ok(())
    }

    /// Appends a bare string entry.
    pub fn add_string(&mut self, value: &str) -> Result<()> {
        let psz_value = CString::new(value)?;
        unsafe {
            self.list_ptr = CSLAddString(self.list_ptr, psz_value.as_ptr());
        }
        Ok(())
    }

    pub fn fetch_name_value(&self, key: &str) -> Result<Option<String>> {
        let key = CString::new(key)?;
        let c_value = unsafe { CSLFetchNameValue(self.as_ptr(), key.as_ptr()) };
        if c_value.is_null() {
            Ok(None)
        } else {
            Ok(Some(_string(c_value)))
        }
    }

    pub fn len(&self) -> usize {
        (unsafe { CSLCount(self.as_ptr()) }) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_ptr(&self) -> gdal_sys::CSLConstList {
        self.list_ptr
    }
}

impl Drop for CslStringList {
    fn drop(&mut self) {
        unsafe { CSLDestroy(self.list_ptr) }
    }
}

impl Default for CslStringList {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_value_round_trip() -> Result<()> {
        let mut l = CslStringList::new();
        l.set_name_value("COMPRESS", "DEFLATE")?;
        l.set_name_value("TILED", "YES")?;
        assert_eq!(l.len(), 2);
        assert!(matches!(l.fetch_name_value("TILED"), Ok(Some(s)) if s == "YES"));
        assert!(matches!(l.fetch_name_value("MISSING"), Ok(None)));
        Ok(())
    }

    #[test]
    fn invalid_keys_are_rejected() {
        let mut l = CslStringList::new();
        assert!(l.set_name_value("a=b", "1").is_err());
        assert!(l.set_name_value("ok", "1\n2").is_err());
    }

    #[test]
    fn plain_strings_count() -> Result<()> {
        let mut l = CslStringList::new();
        assert!(l.is_empty());
        l.add_string("-of")?;
        l.add_string("MEM")?;
        assert_eq!(l.len(), 2);
        Ok(())
    }
}
