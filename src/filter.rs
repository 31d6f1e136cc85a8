//! Relevance filter: is this decoded mail a Maniphest notification we care about?

use tracing::debug;

use crate::model::mail::DecodedMail;
use crate::parser::stamps::StampFilter;

/// Set to `Yes` by Phabricator on mail it generated itself.
pub const SENT_THIS_MESSAGE_HEADER: &str = "X-Phabricator-Sent-This-Message";
/// Space-separated `key(value)` metadata.
pub const STAMPS_HEADER: &str = "X-Phabricator-Stamps";
/// Unique id of the outgoing Phabricator mail.
pub const MAIL_ID_HEADER: &str = "X-Phabricator-Mail-ID";

const MANIPHEST_STAMP: &str = "application(Maniphest)";

/// True iff the mail was sent by Phabricator, concerns Maniphest and its
/// stamps pass `filter`.
pub fn is_relevant(mail: &DecodedMail, filter: &StampFilter) -> bool {
    let sent_by_phabricator = mail.header(SENT_THIS_MESSAGE_HEADER) == Some("Yes");
    let stamps = mail.header(STAMPS_HEADER).unwrap_or("");
    let is_maniphest = stamps.contains(MANIPHEST_STAMP);
    let matches_filter = filter.matches(stamps);

    debug!(
        tag = "filter_decision",
        sent_by_phabricator,
        is_maniphest,
        matches_filter,
        stamps,
        "evaluated relevance"
    );

    sent_by_phabricator && is_maniphest && matches_filter
}
