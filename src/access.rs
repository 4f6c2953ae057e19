//! Access policy for paid-book downloads.
//!
//! A paid (`is_pro`) book's file may only be served to an admin, the book's
//! owner, or a user with a recorded purchase. Free books are open to any
//! authenticated user. The decision is pure; the purchase lookup happens in
//! the handler only when the cheaper checks all fail.

use crate::model::{AuthUser, Book};

/// Full download decision, with the purchase record already resolved.
pub fn grants_download(is_admin: bool, is_owner: bool, is_pro: bool, has_purchase: bool) -> bool {
    is_admin || is_owner || !is_pro || has_purchase
}

/// True when the only thing that could still grant access is a purchase row.
pub fn needs_purchase_check(is_admin: bool, is_owner: bool, is_pro: bool) -> bool {
    !grants_download(is_admin, is_owner, is_pro, false)
}

pub fn is_owner(book: &Book, user: &AuthUser) -> bool {
    book.user_id.as_deref() == Some(user.id.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_download_truth_table() {
        // (is_admin, is_owner, is_pro, has_purchase) -> granted
        let cases = [
            (false, false, false, false, true),
            (false, false, false, true, true),
            (false, false, true, false, false),
            (false, false, true, true, true),
            (false, true, false, false, true),
            (false, true, false, true, true),
            (false, true, true, false, true),
            (false, true, true, true, true),
            (true, false, false, false, true),
            (true, false, false, true, true),
            (true, false, true, false, true),
            (true, false, true, true, true),
            (true, true, false, false, true),
            (true, true, false, true, true),
            (true, true, true, false, true),
            (true, true, true, true, true),
        ];

        for (is_admin, is_owner, is_pro, has_purchase, expected) in cases {
            assert_eq!(
                grants_download(is_admin, is_owner, is_pro, has_purchase),
                expected,
                "admin={} owner={} pro={} purchase={}",
                is_admin,
                is_owner,
                is_pro,
                has_purchase
            );
        }
    }

    #[test]
    fn test_purchase_check_only_for_paid_non_owned() {
        assert!(needs_purchase_check(false, false, true));
        assert!(!needs_purchase_check(false, false, false));
        assert!(!needs_purchase_check(true, false, true));
        assert!(!needs_purchase_check(false, true, true));
    }
}
