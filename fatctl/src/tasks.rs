use std::io::{Read, Write};

use fat83fs::{Fat83Fs, FileDisk, FileType};

use crate::settings::Settings;
use crate::utils::{CtlError, CtlResult, WithPath};
use crate::Command;

pub fn execute(command: &Command, settings: &Settings) -> CtlResult<()> {
    let fs = match command {
        Command::Format { size } => return format(settings, size.unwrap_or(settings.image_size)),
        _ => mount(settings)?,
    };
    match command {
        Command::Format { .. } => Ok(()),
        Command::Mkdir { path } => fs.mkdir(path).at(path),
        Command::Mknod { path } => fs.mknod(path).at(path),
        Command::Ls { path } => {
            let mut out = std::io::stdout().lock();
            for name in fs.readdir(path).at(path)? {
                writeln!(out, "{}", name)?;
            }
            Ok(())
        }
        Command::Stat { path } => {
            let meta = fs.getattr(path).at(path)?;
            let kind = match meta.file_type {
                FileType::Root => "root",
                FileType::Directory => "directory",
                FileType::File => "file",
            };
            println!(
                "{}: type={} mode={:o} nlink={} size={}",
                path,
                kind,
                meta.mode.bits(),
                meta.nlink,
                meta.size
            );
            Ok(())
        }
        Command::Cat { path, offset, length } => {
            let length = match length {
                Some(length) => *length,
                // Reads stop at end of file, so clamping is lossless.
                None => {
                    let rest = fs.getattr(path).at(path)?.size.saturating_sub(*offset);
                    usize::try_from(rest).unwrap_or(usize::MAX)
                }
            };
            let data = fs.read(path, *offset, length).at(path)?;
            std::io::stdout().lock().write_all(&data)?;
            Ok(())
        }
        Command::Write {
            path,
            data,
            offset,
            append,
        } => {
            let bytes = match data {
                Some(text) => text.clone().into_bytes(),
                None => {
                    let mut buf = Vec::new();
                    std::io::stdin().lock().read_to_end(&mut buf)?;
                    buf
                }
            };
            let offset = if *append {
                fs.getattr(path).at(path)?.size
            } else {
                *offset
            };
            let written = fs.write(path, offset, &bytes).at(path)?;
            info!("wrote {} bytes to {} at offset {}", written, path, offset);
            Ok(())
        }
        Command::Df => {
            let free = fs.free_blocks()?;
            println!(
                "{}: {} free blocks ({} bytes)",
                settings.image.display(),
                free,
                free as u64 * fat83fs::config::BLOCK_SIZE as u64
            );
            Ok(())
        }
    }
}

fn format(settings: &Settings, size: u64) -> CtlResult<()> {
    info!("==> Formatting {} ({} bytes)", settings.image.display(), size);
    let mut disk = FileDisk::create(&settings.image, size)?;
    fat83fs::format(&mut disk)?;
    Ok(())
}

fn mount(settings: &Settings) -> CtlResult<Fat83Fs<FileDisk>> {
    if !settings.image.exists() {
        return Err(CtlError::ImageNotFound(settings.image.clone()));
    }
    debug!("mounting {}", settings.image.display());
    Ok(Fat83Fs::open_image(&settings.image)?)
}
