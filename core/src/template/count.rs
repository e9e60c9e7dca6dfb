use super::lexer::tokenize;
use super::scan::{self, TokenStream};
use crate::error::CompileError;

/// Derives the count query for `query`.
///
/// The count target is the alias when the projection is the alias, `*` or
/// absent; a single property path is counted as written; anything else
/// counts the alias. `count_projection` overrides the choice.
pub fn create_count_query_for(
    query: &str,
    count_projection: Option<&str>,
) -> Result<String, CompileError> {
    let tokens = tokenize(query)?;
    let stream = TokenStream::new(query, &tokens);
    let alias = scan::detect_alias(&stream);

    let end = scan::top_level_order_by(&stream).unwrap_or(query.len());

    let (prefix_end, from_start, distinct, target) = match scan::projection_range(&stream) {
        Some((start, end_index, distinct)) => {
            let select = stream.find_top_level("select", 0).unwrap_or(0);
            let Some(from) = stream.tokens.get(end_index) else {
                // nothing to count from; wrap the whole statement
                return Ok(format!(
                    "select count(*) from ({}) count_source",
                    query[..end].trim_end()
                ));
            };

            let projection = if start < end_index {
                &query[stream.tokens[start].start..stream.tokens[end_index - 1].end]
            } else {
                ""
            };
            let target = if projection.is_empty()
                || projection == "*"
                || alias.as_deref().is_some_and(|a| a.eq_ignore_ascii_case(projection))
            {
                None
            } else if scan::is_simple_path(&stream, start, end_index) {
                Some(projection.to_string())
            } else {
                None
            };

            (stream.tokens[select].start, from.start, distinct, target)
        }
        None => {
            let from = stream
                .find_top_level("from", 0)
                .map(|i| stream.tokens[i].start)
                .unwrap_or(0);
            (from, from, false, None)
        }
    };

    let target = match count_projection {
        Some(projection) => projection.to_string(),
        None => target.or(alias).unwrap_or_else(|| "*".to_string()),
    };
    let count = if distinct {
        format!("count(distinct {})", target)
    } else {
        format!("count({})", target)
    };

    let rendered = format!(
        "{}select {} {}",
        &query[..prefix_end],
        count,
        query[from_start..end].trim_end()
    );
    tracing::trace!("Derived count query {}", rendered);
    Ok(rendered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn count(query: &str) -> String {
        create_count_query_for(query, None).unwrap()
    }

    #[test]
    fn counts_alias_and_strips_order_by() {
        assert_eq!(
            count("select u from User u order by u.name"),
            "select count(u) from User u"
        );
        assert_eq!(
            count("SELECT * FROM users u WHERE u.age > ?1 ORDER BY u.age"),
            "select count(u) FROM users u WHERE u.age > ?1"
        );
    }

    #[test]
    fn counts_single_path_unless_overridden() {
        assert_eq!(
            count("select u.name from User u"),
            "select count(u.name) from User u"
        );
        assert_eq!(
            create_count_query_for("select u.name from User u", Some("u.id")).unwrap(),
            "select count(u.id) from User u"
        );
    }

    #[test]
    fn preserves_distinct_and_falls_back_to_alias() {
        assert_eq!(
            count("select distinct u from User u where u.active = true"),
            "select count(distinct u) from User u where u.active = true"
        );
        assert_eq!(
            count("select new com.acme.Dto(u.id, u.name) from User u"),
            "select count(u) from User u"
        );
        assert_eq!(
            count("select max(u.age) from User u"),
            "select count(u) from User u"
        );
    }

    #[test]
    fn prepends_select_when_missing() {
        assert_eq!(
            count("from User u where u.age > :age"),
            "select count(u) from User u where u.age > :age"
        );
    }

    #[test]
    fn keeps_nested_order_by() {
        assert_eq!(
            count("select u from User u where u.id in (select o.user from Order o order by o.id)"),
            "select count(u) from User u where u.id in (select o.user from Order o order by o.id)"
        );
    }

    #[test]
    fn counts_star_without_alias() {
        assert_eq!(count("select * from users"), "select count(*) from users");
    }
}
