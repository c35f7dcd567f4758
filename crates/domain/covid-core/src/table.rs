use crate::CoreError;
use bytes::Bytes;

/// A fetched CSV resource.
///
/// The body is kept byte-for-byte so persisting it reproduces the remote
/// file; the header and row count are parsed once for validation and logs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    pub header: Vec<String>,
    pub rows: usize,
    pub bytes: Bytes,
}

impl Table {
    pub fn from_bytes(bytes: Bytes) -> Result<Self, CoreError> {
        let text = std::str::from_utf8(&bytes)
            .map_err(|e| CoreError::InvalidTable(format!("not utf-8: {e}")))?;
        let text = text.strip_prefix('\u{feff}').unwrap_or(text);

        let mut lines = text.lines().filter(|l| !l.trim().is_empty());
        let header_line = lines
            .next()
            .ok_or_else(|| CoreError::InvalidTable("empty body".into()))?;

        let header: Vec<String> = header_line
            .split(',')
            .map(|c| c.trim().trim_matches('"').to_string())
            .collect();
        if header.iter().all(|c| c.is_empty()) {
            return Err(CoreError::InvalidTable("blank header row".into()));
        }

        let rows = lines.count();
        Ok(Self {
            header,
            rows,
            bytes,
        })
    }

    pub fn len_bytes(&self) -> u64 {
        self.bytes.len() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_header_and_counts_rows() {
        let t = Table::from_bytes(Bytes::from_static(
            b"\xef\xbb\xbfdata,stato,\"tamponi\"\r\n2021-01-30T17:00:00,ITA,1\r\n2021-01-31T17:00:00,ITA,2\r\n\r\n",
        ))
        .unwrap();
        assert_eq!(t.header, vec!["data", "stato", "tamponi"]);
        assert_eq!(t.rows, 2);
    }

    #[test]
    fn rejects_empty_and_binary_bodies() {
        assert!(Table::from_bytes(Bytes::new()).is_err());
        assert!(Table::from_bytes(Bytes::from_static(b"\n\n")).is_err());
        assert!(Table::from_bytes(Bytes::from_static(b",,,\n1,2,3\n")).is_err());
        assert!(Table::from_bytes(Bytes::from_static(&[0xff, 0xfe, 0x00])).is_err());
    }
}
