//! Operator-facing text: the reminder comment and run summaries.

use crate::model::ShoppingItem;

pub const NOTHING_TO_SEND: &str = "未チェック項目はありません。通知は送信されませんでした。";
pub const ALL_FAILED: &str = "すべてのデータベースへの通知に失敗しました。";
pub const CONFIG_ERROR: &str = "設定エラーが発生しました。";
pub const UNEXPECTED_ERROR: &str = "予期しないエラーが発生しました。";

/// Body of the reminder comment posted on a source's page.
pub fn format_comment_message(source_name: &str, items: &[ShoppingItem]) -> String {
    let mut message = format!(
        "🛒 【{}】{}件の未チェック項目があります:\n\n",
        source_name,
        items.len()
    );
    for item in items {
        message.push_str("• ");
        message.push_str(&item.name);
        message.push('\n');
    }
    message.push_str("\n買い忘れがないよう確認をお願いします！");
    message
}

pub fn all_notified(successes: usize, total_items: usize) -> String {
    format!(
        "{}件のデータベースに通知を送信しました（未チェック項目 合計{}件）。",
        successes, total_items
    )
}

pub fn partially_notified(successes: usize, failures: usize) -> String {
    format!(
        "{}件のデータベースへの通知に成功し、{}件が失敗しました。",
        successes, failures
    )
}
