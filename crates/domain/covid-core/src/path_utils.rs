use crate::Scope;
use chrono::NaiveDate;

pub struct DatasetPath;

impl DatasetPath {
    const CONTAGIONS_PREFIX: &'static str = "dpc-covid19-ita";

    /// File name of a contagions table, e.g.
    /// `dpc-covid19-ita-regioni-20210130.csv`.
    pub fn contagions_file_name(scope: Scope, date: NaiveDate) -> String {
        format!(
            "{}-{}-{}.csv",
            Self::CONTAGIONS_PREFIX,
            scope.tag(),
            date.format("%Y%m%d")
        )
    }

    /// Inverse of [`DatasetPath::contagions_file_name`]. Returns `None` for
    /// names of another scope or with a malformed date.
    pub fn parse_contagions_file_name(scope: Scope, name: &str) -> Option<NaiveDate> {
        let stem = name.strip_suffix(".csv")?;
        let rest = stem
            .strip_prefix(Self::CONTAGIONS_PREFIX)?
            .strip_prefix('-')?
            .strip_prefix(scope.tag())?
            .strip_prefix('-')?;
        if rest.len() != 8 || !rest.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        NaiveDate::parse_from_str(rest, "%Y%m%d").ok()
    }

    /// Join path segments onto a base URL with single slashes.
    pub fn remote_url(base: &str, segments: &[&str]) -> String {
        let mut url = base.trim_end_matches('/').to_string();
        for seg in segments {
            let seg = seg.trim_matches('/');
            if seg.is_empty() {
                continue;
            }
            url.push('/');
            url.push_str(seg);
        }
        url
    }

    /// Reject names that would escape the dataset directory.
    pub fn verify_safe(rel_path: &str) -> bool {
        let p = std::path::Path::new(rel_path);
        !rel_path.is_empty()
            && !p.is_absolute()
            && !p
                .components()
                .any(|c| matches!(c, std::path::Component::ParentDir))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_name_embeds_tag_and_eight_digit_date() {
        let date = NaiveDate::from_ymd_opt(2021, 1, 3).unwrap();
        assert_eq!(
            DatasetPath::contagions_file_name(Scope::National, date),
            "dpc-covid19-ita-andamento-nazionale-20210103.csv"
        );
        assert_eq!(
            DatasetPath::contagions_file_name(Scope::Regional, date),
            "dpc-covid19-ita-regioni-20210103.csv"
        );
    }

    #[test]
    fn parse_rejects_other_scope_and_bad_dates() {
        let date = NaiveDate::from_ymd_opt(2020, 2, 29).unwrap();
        let name = DatasetPath::contagions_file_name(Scope::Regional, date);
        assert_eq!(
            DatasetPath::parse_contagions_file_name(Scope::Regional, &name),
            Some(date)
        );
        assert_eq!(
            DatasetPath::parse_contagions_file_name(Scope::National, &name),
            None
        );
        assert_eq!(
            DatasetPath::parse_contagions_file_name(
                Scope::Regional,
                "dpc-covid19-ita-regioni-20210230.csv"
            ),
            None
        );
        assert_eq!(
            DatasetPath::parse_contagions_file_name(
                Scope::Regional,
                "dpc-covid19-ita-regioni-latest.csv"
            ),
            None
        );
    }

    #[test]
    fn remote_url_collapses_slashes() {
        assert_eq!(
            DatasetPath::remote_url("https://host/base/", &["dati-regioni", "/x.csv"]),
            "https://host/base/dati-regioni/x.csv"
        );
        assert_eq!(DatasetPath::remote_url("https://host", &[]), "https://host");
    }

    #[test]
    fn verify_safe_rejects_traversal() {
        assert!(DatasetPath::verify_safe("platea.csv"));
        assert!(!DatasetPath::verify_safe("../platea.csv"));
        assert!(!DatasetPath::verify_safe("/etc/passwd"));
        assert!(!DatasetPath::verify_safe(""));
    }
}
