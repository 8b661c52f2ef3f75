//! Zip archive writer for the staging tree.
//!
//! Walks the staging directory in sorted order and writes every entry the
//! skip predicate does not reject. The predicate owns the policy (the
//! pipeline rejects manifest files and symbolic links); this module only
//! owns the container mechanics.

use std::fs::File;
use std::io;
use std::path::Path;

use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use crate::error::{Error, Result};

/// Writes one zip from one input directory.
pub struct ZipFileGenerator<'a> {
    input_dir: &'a Path,
    output_file: &'a Path,
}

impl<'a> ZipFileGenerator<'a> {
    pub fn new(input_dir: &'a Path, output_file: &'a Path) -> Self {
        Self {
            input_dir,
            output_file,
        }
    }

    /// Write the archive, omitting every path the predicate rejects.
    ///
    /// Rejected directories are omitted as entries but their contents are
    /// still considered; rejected files are omitted outright.
    pub fn write<F>(&self, skip: F) -> Result<()>
    where
        F: Fn(&Path) -> bool,
    {
        if let Some(parent) = self.output_file.parent() {
            std::fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
        }
        let file = File::create(self.output_file).map_err(|e| Error::io(self.output_file, e))?;
        let mut writer = ZipWriter::new(file);
        let options = SimpleFileOptions::default();

        for entry in WalkDir::new(self.input_dir).min_depth(1).sort_by_file_name() {
            let entry = entry.map_err(|e| {
                let path = e
                    .path()
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| self.input_dir.to_path_buf());
                Error::io(path, e.into())
            })?;
            let path = entry.path();
            if skip(path) {
                continue;
            }
            let name = path
                .strip_prefix(self.input_dir)
                .unwrap_or(path)
                .to_string_lossy()
                .into_owned();
            if entry.file_type().is_dir() {
                writer
                    .add_directory(name.as_str(), options)
                    .map_err(|e| zip_error(self.output_file, e))?;
            } else if entry.file_type().is_file() {
                writer
                    .start_file(name.as_str(), options)
                    .map_err(|e| zip_error(self.output_file, e))?;
                let mut input = File::open(path).map_err(|e| Error::io(path, e))?;
                io::copy(&mut input, &mut writer).map_err(|e| Error::io(path, e))?;
            }
            // Symlinks fall through: a skip predicate that admits them has
            // nothing sensible to write, so they are never archived.
        }

        writer
            .finish()
            .map_err(|e| zip_error(self.output_file, e))?;
        Ok(())
    }
}

fn zip_error(output: &Path, err: zip::result::ZipError) -> Error {
    Error::io(output, io::Error::other(err))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::os::unix::fs::symlink;
    use tempfile::TempDir;
    use zip::ZipArchive;

    fn entry_names(path: &Path) -> Vec<String> {
        let archive = ZipArchive::new(File::open(path).unwrap()).unwrap();
        archive.file_names().map(str::to_string).collect()
    }

    #[test]
    fn writes_files_and_directories() {
        let temp = TempDir::new().unwrap();
        let input = temp.path().join("staged");
        fs::create_dir_all(input.join("ios")).unwrap();
        fs::write(input.join("ios/data.bin"), "bytes").unwrap();
        fs::write(input.join("LICENSE"), "mit").unwrap();

        let output = temp.path().join("out.zip");
        ZipFileGenerator::new(&input, &output).write(|_| false).unwrap();

        let names = entry_names(&output);
        assert!(names.iter().any(|n| n == "LICENSE"));
        assert!(names.iter().any(|n| n == "ios/data.bin"));
    }

    #[test]
    fn skip_predicate_excludes_manifests_and_symlinks() {
        let temp = TempDir::new().unwrap();
        let input = temp.path().join("staged");
        fs::create_dir_all(&input).unwrap();
        fs::write(input.join("MyLib.podspec"), "spec").unwrap();
        fs::write(input.join("kept.txt"), "k").unwrap();
        symlink(input.join("kept.txt"), input.join("alias.txt")).unwrap();

        let output = temp.path().join("out.zip");
        ZipFileGenerator::new(&input, &output)
            .write(|path| {
                path.extension().is_some_and(|ext| ext == "podspec") || path.is_symlink()
            })
            .unwrap();

        let names = entry_names(&output);
        assert_eq!(names, vec!["kept.txt".to_string()]);
    }

    #[test]
    fn archived_contents_round_trip() {
        let temp = TempDir::new().unwrap();
        let input = temp.path().join("staged");
        fs::create_dir_all(&input).unwrap();
        fs::write(input.join("file.txt"), "payload").unwrap();

        let output = temp.path().join("out.zip");
        ZipFileGenerator::new(&input, &output).write(|_| false).unwrap();

        let mut archive = ZipArchive::new(File::open(&output).unwrap()).unwrap();
        let mut entry = archive.by_name("file.txt").unwrap();
        let mut contents = String::new();
        io::Read::read_to_string(&mut entry, &mut contents).unwrap();
        assert_eq!(contents, "payload");
    }
}
