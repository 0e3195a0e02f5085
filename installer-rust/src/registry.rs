//! `HKEY_CURRENT_USER`-backed environment store.

#[cfg(windows)]
pub use imp::RegistryStore;

/// Wide, NUL-terminated copy of `s` for the `W` APIs.
pub fn to_wide(s: &str) -> Vec<u16> {
    s.encode_utf16().chain(std::iter::once(0)).collect()
}

/// Decodes registry string data, dropping the terminator and anything after.
pub fn from_wide(buf: &[u16]) -> String {
    let end = buf.iter().position(|&c| c == 0).unwrap_or(buf.len());
    String::from_utf16_lossy(&buf[..end])
}

#[cfg(windows)]
mod imp {
    use std::ptr;

    use windows_sys::Win32::Foundation::{ERROR_FILE_NOT_FOUND, ERROR_SUCCESS};
    use windows_sys::Win32::System::Registry::{
        RegCloseKey, RegCreateKeyExW, RegOpenKeyExW, RegQueryValueExW, RegSetValueExW, HKEY,
        HKEY_CURRENT_USER, KEY_READ, KEY_WRITE, REG_EXPAND_SZ, REG_OPTION_NON_VOLATILE, REG_SZ,
    };
    use windows_sys::Win32::UI::WindowsAndMessaging::{
        SendMessageTimeoutW, HWND_BROADCAST, SMTO_ABORTIFHUNG, WM_SETTINGCHANGE,
    };

    use super::{from_wide, to_wide};
    use crate::{
        error::StoreError,
        store::{EnvironmentStore, ValueKind, ENVIRONMENT_KEY},
    };

    const BROADCAST_TIMEOUT_MS: u32 = 5000;

    struct Key(HKEY);

    impl Drop for Key {
        fn drop(&mut self) {
            unsafe { RegCloseKey(self.0) };
        }
    }

    fn os_err(op: &'static str, key: &str, code: u32) -> StoreError {
        StoreError::Os {
            op,
            key: key.to_string(),
            code,
        }
    }

    #[derive(Debug, Default)]
    pub struct RegistryStore;

    impl RegistryStore {
        pub fn new() -> Self {
            Self
        }

        fn open(&self, key: &str) -> Result<Option<Key>, StoreError> {
            let wide = to_wide(key);
            let mut handle: HKEY = 0;
            let rc = unsafe { RegOpenKeyExW(HKEY_CURRENT_USER, wide.as_ptr(), 0, KEY_READ, &mut handle) };
            match rc {
                ERROR_SUCCESS => Ok(Some(Key(handle))),
                ERROR_FILE_NOT_FOUND => Ok(None),
                code => Err(os_err("RegOpenKeyExW", key, code)),
            }
        }

        fn create(&self, key: &str) -> Result<Key, StoreError> {
            let wide = to_wide(key);
            let mut handle: HKEY = 0;
            let rc = unsafe {
                RegCreateKeyExW(
                    HKEY_CURRENT_USER,
                    wide.as_ptr(),
                    0,
                    ptr::null(),
                    REG_OPTION_NON_VOLATILE,
                    KEY_READ | KEY_WRITE,
                    ptr::null(),
                    &mut handle,
                    ptr::null_mut(),
                )
            };
            if rc != ERROR_SUCCESS {
                return Err(os_err("RegCreateKeyExW", key, rc));
            }
            Ok(Key(handle))
        }
    }

    impl EnvironmentStore for RegistryStore {
        fn read_string(&self, key: &str, name: &str) -> Result<Option<String>, StoreError> {
            let Some(handle) = self.open(key)? else {
                return Ok(None);
            };
            let wname = to_wide(name);
            let mut kind = 0u32;
            let mut size = 0u32;
            let rc = unsafe {
                RegQueryValueExW(
                    handle.0,
                    wname.as_ptr(),
                    ptr::null(),
                    &mut kind,
                    ptr::null_mut(),
                    &mut size,
                )
            };
            match rc {
                ERROR_SUCCESS => {}
                ERROR_FILE_NOT_FOUND => return Ok(None),
                code => return Err(os_err("RegQueryValueExW", key, code)),
            }
            if kind != REG_SZ && kind != REG_EXPAND_SZ {
                return Err(StoreError::NotAString {
                    key: key.to_string(),
                    name: name.to_string(),
                });
            }

            // One spare unit in case the stored data lacks a terminator.
            let mut buf = vec![0u16; size as usize / 2 + 1];
            let mut size = (buf.len() * 2) as u32;
            let rc = unsafe {
                RegQueryValueExW(
                    handle.0,
                    wname.as_ptr(),
                    ptr::null(),
                    &mut kind,
                    buf.as_mut_ptr().cast(),
                    &mut size,
                )
            };
            if rc != ERROR_SUCCESS {
                return Err(os_err("RegQueryValueExW", key, rc));
            }
            Ok(Some(from_wide(&buf[..size as usize / 2])))
        }

        fn write_string(
            &mut self,
            key: &str,
            name: &str,
            value: &str,
            kind: ValueKind,
        ) -> Result<(), StoreError> {
            let handle = self.create(key)?;
            let wname = to_wide(name);
            let data = to_wide(value);
            let reg_kind = match kind {
                ValueKind::String => REG_SZ,
                ValueKind::ExpandString => REG_EXPAND_SZ,
            };
            let rc = unsafe {
                RegSetValueExW(
                    handle.0,
                    wname.as_ptr(),
                    0,
                    reg_kind,
                    data.as_ptr().cast(),
                    (data.len() * 2) as u32,
                )
            };
            if rc != ERROR_SUCCESS {
                return Err(os_err("RegSetValueExW", key, rc));
            }
            Ok(())
        }

        fn broadcast_environment_change(&self) -> Result<(), StoreError> {
            let param = to_wide(ENVIRONMENT_KEY);
            let mut result = 0usize;
            let rc = unsafe {
                SendMessageTimeoutW(
                    HWND_BROADCAST,
                    WM_SETTINGCHANGE,
                    0,
                    param.as_ptr() as isize,
                    SMTO_ABORTIFHUNG,
                    BROADCAST_TIMEOUT_MS,
                    &mut result,
                )
            };
            if rc == 0 {
                let code = unsafe { windows_sys::Win32::Foundation::GetLastError() };
                return Err(os_err("SendMessageTimeoutW", ENVIRONMENT_KEY, code));
            }
            Ok(())
        }
    }
}
