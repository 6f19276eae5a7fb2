//! Bits of Telegram HTML for replies

use std::borrow::Cow;

use askama_escape::{escape, Html};
use chrono::Duration;

use crate::role_gate::SubjectId;
use crate::{DateTime, Offset};

pub fn escape_html(s: &str) -> String {
    escape(s, Html).to_string()
}

pub fn bold<S: AsRef<str>>(s: S) -> String {
    format!("<b>{}</b>", escape_html(s.as_ref()))
}

pub fn link<U: AsRef<str>, N: AsRef<str>>(url: U, name: N) -> String {
    let name = escape_html(name.as_ref());
    let url = url.as_ref();
    format!("<a href=\"{url}\">{name}</a>")
}

/// Mention of a telegram user that works without a username
pub fn user_link<N: AsRef<str>>(uid: SubjectId, name: N) -> String {
    link(format!("tg://user?id={uid}"), name)
}

pub fn time_ago(t: DateTime) -> String {
    let dur = Offset::now().signed_duration_since(t);
    if dur <= Duration::zero() {
        return "just now".to_string()
    }
    format!("{} ago", human_positive_duration(dur))
}

fn pluralize(n: i64, what: &str) -> Cow<'_, str> {
    if n == 1 {
        what.into()
    } else {
        format!("{what}s").into()
    }
}

pub fn human_positive_duration(dur: Duration) -> String {
    let units = [
        (dur.num_weeks(), "week"),
        (dur.num_days(), "day"),
        (dur.num_hours(), "hour"),
        (dur.num_minutes(), "minute"),
    ];
    for (n, unit) in units {
        if n > 0 {
            return format!("{n} {}", pluralize(n, unit))
        }
    }
    if dur.num_seconds() > 30 {
        return "about a minute".to_string()
    }
    "a few seconds".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape() {
        assert_eq!("&lt;i&gt;Tom &amp; Jerry", escape_html("<i>Tom & Jerry"));
        assert_eq!("<b>1 &lt; 2</b>", bold("1 < 2"));
        assert_eq!("<a href=\"tg://user?id=42\">Aziz</a>", user_link(42, "Aziz"));
    }

    #[test]
    fn test_humanize_positive_duration() {
        assert_eq!("4 weeks", human_positive_duration(Duration::weeks(4)));
        assert_eq!("1 day", human_positive_duration(Duration::days(1) + Duration::hours(3)));
        assert_eq!("1 minute",
                   human_positive_duration(Duration::minutes(1) + Duration::seconds(5)));
        assert_eq!("about a minute", human_positive_duration(Duration::seconds(40)));
        assert_eq!("a few seconds", human_positive_duration(Duration::seconds(2)));
    }

    #[test]
    fn test_time_ago() {
        assert_eq!("2 hours ago", time_ago(Offset::now() - Duration::minutes(125)));
        assert_eq!("just now", time_ago(Offset::now() + Duration::minutes(5)));
    }
}
