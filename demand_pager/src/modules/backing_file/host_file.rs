/*
 *  Copyright (C) 2025  Markus Elias Gerber
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the GNU General Public License as published by
 *  the Free Software Foundation, either version 3 of the License, or
 *  (at your option) any later version.
 *
 *  This program is distributed in the hope that it will be useful,
 *  but WITHOUT ANY WARRANTY; without even the implied warranty of
 *  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *  GNU General Public License for more details.
 *
 *  You should have received a copy of the GNU General Public License
 *  along with this program.  If not, see <https://www.gnu.org/licenses/>.
 */

use std::{
    fs::File,
    io::{Read, Seek, SeekFrom, Write},
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use super::{BackingFileModule, FileHandle};

/// A regular file of the host file system.
pub struct HostBackingFile {
    /// every handle has its own cursor
    file: Mutex<File>,

    /// path of file, required to reopen it
    file_path: PathBuf,
}

impl HostBackingFile {
    /// Opens an existing file for reading and writing
    pub fn open<P: AsRef<Path>>(path: P) -> std::io::Result<Self> {
        let file = File::options().read(true).write(true).open(path.as_ref())?;

        Ok(Self {
            file: Mutex::new(file),
            file_path: path.as_ref().to_path_buf(),
        })
    }
}

fn file_length(file: &File) -> Result<usize, ()> {
    let metadata = file.metadata().map_err(|_| ())?;
    usize::try_from(metadata.len()).map_err(|_| ())
}

impl BackingFileModule for HostBackingFile {
    fn read_at(&self, dest: &mut [u8], offset: usize) -> Result<usize, ()> {
        let mut file = self.file.lock().map_err(|_| ())?;
        file.seek(SeekFrom::Start(offset as u64)).map_err(|_| ())?;

        // read until either `dest` is full or the end of the file is reached
        let mut total = 0;
        while total < dest.len() {
            match file.read(&mut dest[total..]) {
                Ok(0) => break,
                Ok(count) => total += count,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(_) => return Err(()),
            }
        }

        Ok(total)
    }

    fn write_at(&self, src: &[u8], offset: usize) -> Result<usize, ()> {
        let mut file = self.file.lock().map_err(|_| ())?;
        let length = file_length(&file)?;
        if offset >= length {
            return Ok(0);
        }
        let count = src.len().min(length - offset);

        file.seek(SeekFrom::Start(offset as u64)).map_err(|_| ())?;
        file.write_all(&src[..count]).map_err(|_| ())?;

        Ok(count)
    }

    fn length(&self) -> Result<usize, ()> {
        let file = self.file.lock().map_err(|_| ())?;
        file_length(&file)
    }

    fn reopen(&self) -> Result<FileHandle, ()> {
        let reopened = HostBackingFile::open(&self.file_path).map_err(|_| ())?;
        Ok(Arc::new(reopened))
    }
}

#[cfg(test)]
mod test {
    use std::fs::{remove_file, write};

    use super::super::test::{test_backing_file_read_write, test_backing_file_reopen};
    use super::HostBackingFile;

    #[test]
    fn test_host_file_read_write() {
        let path = "/tmp/test_host_file_read_write.tmp";
        write(path, vec![0u8; 64]).unwrap();

        test_backing_file_read_write(&HostBackingFile::open(path).unwrap());
        let _ = remove_file(path);
    }

    #[test]
    fn test_host_file_reopen() {
        let path = "/tmp/test_host_file_reopen.tmp";
        write(path, vec![0u8; 64]).unwrap();

        test_backing_file_reopen(&HostBackingFile::open(path).unwrap());
        let _ = remove_file(path);
    }

    #[test]
    fn test_host_file_missing() {
        assert!(HostBackingFile::open("/tmp/test_host_file_missing.does_not_exist").is_err());
    }
}
