use crate::A2lError;
use std::fs::File;
use std::io::Read;
use std::path::{MAIN_SEPARATOR, Path, PathBuf};

/// Text encoding of a2l input files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Encoding {
    /// ISO 8859-1. Every byte maps to exactly one character, so decoding never fails.
    #[default]
    Latin1,
    /// UTF-8. Invalid input is reported as an [`A2lError::EncodingError`].
    Utf8,
    /// Guess the encoding: UTF-32 and UTF-16 are recognized by their BOM or by the
    /// position of nul bytes, then UTF-8 is tried, and Latin-1 is the fallback.
    Detect,
}

// resolve_include()
// Locate the file named by an /include directive.
// The search order is: absolute path as given, the working directory, the directory
// of the including file, then each configured search directory.
pub(crate) fn resolve_include(
    incname: &str,
    includer: Option<&Path>,
    search_paths: &[PathBuf],
) -> Option<PathBuf> {
    let normalized_incname: String = incname
        .replace('\\', MAIN_SEPARATOR.to_string().as_str())
        .replace('/', MAIN_SEPARATOR.to_string().as_str());
    let inc_path = Path::new(&normalized_incname);

    if inc_path.is_absolute() {
        return inc_path.is_file().then(|| inc_path.to_path_buf());
    }

    if inc_path.is_file() {
        return Some(inc_path.to_path_buf());
    }

    let includer_dir = includer.and_then(Path::parent);
    includer_dir
        .into_iter()
        .chain(search_paths.iter().map(PathBuf::as_path))
        .map(|dir| dir.join(inc_path))
        .find(|candidate| candidate.is_file())
}

/// read a file and decode its content using the given encoding
///
/// # Errors
///
/// [`A2lError::FileOpenError`] or [`A2lError::FileReadError`] if the file can't be read,
/// [`A2lError::EncodingError`] if the content is not valid in the requested encoding.
pub fn load(path: &Path, encoding: Encoding) -> Result<String, A2lError> {
    let mut file = match File::open(path) {
        Ok(file) => file,
        Err(error) => {
            return Err(A2lError::FileOpenError {
                filename: path.to_path_buf(),
                ioerror: error,
            });
        }
    };

    let filedata = read_data(&mut file, path)?;
    decode(&filedata, encoding, path)
}

fn read_data(file: &mut File, path: &Path) -> Result<Vec<u8>, A2lError> {
    let filesize = match file.metadata() {
        Ok(metadata) => metadata.len(),
        Err(err) => {
            return Err(A2lError::FileReadError {
                filename: path.to_path_buf(),
                ioerror: err,
            });
        }
    };
    let bufsize = usize::try_from(filesize).unwrap_or(usize::MAX);
    let mut buffer = Vec::with_capacity(bufsize);
    match file.read_to_end(&mut buffer) {
        Ok(_) => Ok(buffer),
        Err(err) => Err(A2lError::FileReadError {
            filename: path.to_path_buf(),
            ioerror: err,
        }),
    }
}

// decode()
const UTF8_BOM: &[u8] = &[0xef, 0xbb, 0xbf];

// convert raw file content to a String. A leading BOM is stripped for every encoding.
pub(crate) fn decode(filedata: &[u8], encoding: Encoding, path: &Path) -> Result<String, A2lError> {
    let text = match encoding {
        Encoding::Latin1 => decode_latin1(filedata.strip_prefix(UTF8_BOM).unwrap_or(filedata)),
        Encoding::Utf8 => match std::str::from_utf8(filedata) {
            Ok(text) => text.to_string(),
            Err(err) => {
                return Err(A2lError::EncodingError {
                    filename: path.to_path_buf(),
                    position: err.valid_up_to(),
                });
            }
        },
        Encoding::Detect => decode_raw_bytes(filedata),
    };

    if encoding != Encoding::Latin1 {
        if let Some(stripped) = text.strip_prefix('\u{feff}') {
            return Ok(stripped.to_string());
        }
    }
    Ok(text)
}

fn decode_latin1(filedata: &[u8]) -> String {
    filedata.iter().map(|ch| char::from(*ch)).collect()
}

fn decode_raw_bytes(filedata: &[u8]) -> String {
    /* an a2l file must start with either a BOM or a character from the basic ASCII set.
    UTF-16 and UTF-32 can be recognized by the nul bytes in the first character. */

    /* UTF-32
     * Big endian: 0x00 0x00 0xFE 0xFF for a BOM, or 00 00 00 xx otherwise.
     * Little endian: 0xFF 0xFE 0x00 0x00 for a BOM, or xx 00 00 00 otherwise. */
    if (filedata.len() % 4 == 0) && (filedata.len() > 3) {
        let u32conversion: Option<fn([u8; 4]) -> u32> =
            if (filedata[0] == 0) && (filedata[1] == 0) && (filedata[3] != 0) {
                Some(u32::from_be_bytes)
            } else if (filedata[0] != 0) && (filedata[2] == 0) && (filedata[3] == 0) {
                Some(u32::from_le_bytes)
            } else {
                None
            };
        if let Some(conversion) = u32conversion {
            let converted: Option<String> = filedata
                .chunks_exact(4)
                .map(|bytes| char::from_u32(conversion([bytes[0], bytes[1], bytes[2], bytes[3]])))
                .collect();
            if let Some(text) = converted {
                return text;
            }
        }
    }

    /* UTF-16
     * Big endian BOM is 0xfe 0xff, otherwise the first character is 0x00 0x??
     * Little endian BOM is 0xff 0xfe, otherwise the first character is 0x?? 0x00 */
    if (filedata.len() % 2 == 0) && (filedata.len() > 1) {
        let u16conversion: Option<fn([u8; 2]) -> u16> = if ((filedata[0] == 0)
            && (filedata[1] != 0))
            || (filedata[0] == 0xfe && filedata[1] == 0xff)
        {
            Some(u16::from_be_bytes)
        } else if ((filedata[0] != 0) && (filedata[1] == 0))
            || (filedata[0] == 0xff && filedata[1] == 0xfe)
        {
            Some(u16::from_le_bytes)
        } else {
            None
        };
        if let Some(conversion) = u16conversion {
            let filedata_u16: Vec<u16> = filedata
                .chunks_exact(2)
                .map(|bytes| conversion([bytes[0], bytes[1]]))
                .collect();
            if let Ok(converted) = String::from_utf16(&filedata_u16) {
                return converted;
            }
        }
    }

    if let Ok(converted) = String::from_utf8(filedata.to_vec()) {
        return converted;
    }

    decode_latin1(filedata)
}

/*************************************************************************************************/

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn load_nonexistent_file() {
        let result = load(Path::new("file/does/not/exist"), Encoding::Latin1);
        assert!(matches!(result, Err(A2lError::FileOpenError { .. })));
    }

    #[test]
    fn decode_latin1_bytes() {
        let data: Vec<u8> = vec![0x41, 0xa9, 0xe4];
        let text = decode(&data, Encoding::Latin1, Path::new("x")).unwrap();
        assert_eq!(text, "A\u{a9}\u{e4}");
        // a UTF-8 BOM is dropped, not decoded as three characters
        let data: Vec<u8> = vec![239, 187, 191, 65, 0xe4];
        let text = decode(&data, Encoding::Latin1, Path::new("x")).unwrap();
        assert_eq!(text, "A\u{e4}");
    }

    #[test]
    fn decode_utf8_bytes() {
        let data: Vec<u8> = vec![239, 187, 191, 65, 66];
        let text = decode(&data, Encoding::Utf8, Path::new("x")).unwrap();
        assert_eq!(text, "AB");

        let data: Vec<u8> = vec![65, 66, 0xa9];
        let result = decode(&data, Encoding::Utf8, Path::new("x"));
        assert!(matches!(
            result,
            Err(A2lError::EncodingError { position: 2, .. })
        ));
    }

    #[test]
    fn decode_raw_bytes_u32() {
        // big endian
        let data: Vec<u8> = vec![0, 0, 0, 65, 0, 0, 0, 66];
        assert_eq!(decode_raw_bytes(&data), String::from("AB"));
        // little endian, with BOM
        let data: Vec<u8> = vec![0xff, 0xfe, 0, 0, 65, 0, 0, 0, 66, 0, 0, 0];
        assert_eq!(decode_raw_bytes(&data), String::from("\u{feff}AB"));
        let text = decode(&data, Encoding::Detect, Path::new("x")).unwrap();
        assert_eq!(text, "AB");
    }

    #[test]
    fn decode_raw_bytes_u16() {
        let data: Vec<u8> = vec![65, 0, 66, 0, 65, 0, 66, 0];
        assert_eq!(decode_raw_bytes(&data), String::from("ABAB"));
        let data: Vec<u8> = vec![0xfe, 0xff, 00, 65, 0, 66, 0, 65, 0, 66];
        assert_eq!(decode_raw_bytes(&data), String::from("\u{feff}ABAB"));
    }

    #[test]
    fn decode_raw_bytes_fallback() {
        let data: Vec<u8> = vec![0xa9]; // "©" in Latin-1
        assert_eq!(decode_raw_bytes(&data), String::from("\u{00a9}"));
    }

    #[test]
    fn include_search_order() {
        let dir = tempdir().unwrap();
        let base = dir.path().join("base.a2l");
        std::fs::write(&base, "").unwrap();

        // next to the including file
        let subdir = dir.path().join("abc");
        std::fs::create_dir(&subdir).unwrap();
        std::fs::write(subdir.join("inc1.a2l"), "").unwrap();
        let found = resolve_include("abc/inc1.a2l", Some(&base), &[]).unwrap();
        assert_eq!(
            found.canonicalize().unwrap(),
            subdir.join("inc1.a2l").canonicalize().unwrap()
        );

        // windows style separators work everywhere
        let found = resolve_include(r"abc\inc1.a2l", Some(&base), &[]).unwrap();
        assert_eq!(
            found.canonicalize().unwrap(),
            subdir.join("inc1.a2l").canonicalize().unwrap()
        );

        // only found via the search path
        let searchdir = tempdir().unwrap();
        std::fs::write(searchdir.path().join("inc2.a2l"), "").unwrap();
        assert!(resolve_include("inc2.a2l", Some(&base), &[]).is_none());
        let found =
            resolve_include("inc2.a2l", Some(&base), &[searchdir.path().to_path_buf()]).unwrap();
        assert_eq!(found, searchdir.path().join("inc2.a2l"));

        // the includer's directory is searched before the search path
        std::fs::write(dir.path().join("inc2.a2l"), "").unwrap();
        let found =
            resolve_include("inc2.a2l", Some(&base), &[searchdir.path().to_path_buf()]).unwrap();
        assert_eq!(found, dir.path().join("inc2.a2l"));

        // absolute paths are used directly
        let absolute = subdir.join("inc1.a2l");
        let found = resolve_include(&absolute.to_string_lossy(), None, &[]).unwrap();
        assert_eq!(found, absolute);
    }
}
