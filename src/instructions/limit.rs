//! `limitedTo` (§4.4.6).

use crate::query::QueryKind;

/// Default page size used when a multi-record query carries no `limitedTo`
/// but still needs the extra-row probe for pagination (§8 scenario 2 uses an
/// explicit `limitedTo`, so this only matters for the unbounded default).
const DEFAULT_PAGE_SIZE: u32 = 100;

/// Resolve the `LIMIT` clause. Single-record queries always get `LIMIT 1`;
/// multi-record reads get `LIMIT <pageSize + 1>` so the composer can detect
/// "more records exist" by the presence of the extra row (§4.6 step 5).
/// Mutating queries without a page-size request get no limit at all.
pub fn resolve_limit(kind: QueryKind, is_single_record: bool, limited_to: Option<u32>) -> Option<String> {
    if is_single_record {
        return Some("LIMIT 1".to_string());
    }
    if kind.is_ddl() {
        return None;
    }
    match kind {
        QueryKind::Get | QueryKind::Count => {
            let page_size = limited_to.unwrap_or(DEFAULT_PAGE_SIZE);
            Some(format!("LIMIT {}", page_size as u64 + 1))
        }
        _ => limited_to.map(|n| format!("LIMIT {n}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_record_always_limit_one() {
        assert_eq!(resolve_limit(QueryKind::Get, true, None), Some("LIMIT 1".to_string()));
    }

    #[test]
    fn multi_record_get_adds_one_to_page_size() {
        assert_eq!(
            resolve_limit(QueryKind::Get, false, Some(20)),
            Some("LIMIT 21".to_string())
        );
    }

    #[test]
    fn multi_record_get_defaults_page_size() {
        assert_eq!(
            resolve_limit(QueryKind::Get, false, None),
            Some("LIMIT 101".to_string())
        );
    }

    #[test]
    fn set_without_limited_to_has_no_limit() {
        assert_eq!(resolve_limit(QueryKind::Set, false, None), None);
    }
}
