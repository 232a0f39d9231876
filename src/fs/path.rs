//! Path classification.
//!
//! Only three shapes exist: `/`, `/DIR` and `/DIR/NAME[.EXT]`. Anything
//! else is rejected rather than guessed at.

use crate::error::{FsError, FsResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FsPath {
    Root,
    Directory { dir: String },
    File { dir: String, name: String, ext: String },
}

impl FsPath {
    pub fn parse(path: &str) -> FsResult<Self> {
        let invalid = || FsError::InvalidPath(String::from(path));

        let rest = path.strip_prefix('/').ok_or_else(invalid)?;
        if rest.is_empty() {
            return Ok(FsPath::Root);
        }
        if rest.contains('\0') {
            return Err(invalid());
        }

        let mut parts = rest.split('/');
        let dir = parts
            .next()
            .filter(|d| !matches!(*d, "" | "." | ".."))
            .ok_or_else(invalid)?;
        let file = parts.next();
        if parts.next().is_some() {
            return Err(invalid());
        }

        match file {
            // "/DIR" or "/DIR/"
            None | Some("") => Ok(FsPath::Directory {
                dir: String::from(dir),
            }),
            Some(file) => {
                let (name, ext) = file.split_once('.').unwrap_or((file, ""));
                if name.is_empty() || ext.contains('.') {
                    return Err(invalid());
                }
                Ok(FsPath::File {
                    dir: String::from(dir),
                    name: String::from(name),
                    ext: String::from(ext),
                })
            }
        }
    }
}
