//! Message copy for prediction and result broadcasts

use crate::models::{format_order, Bet, OutcomeTier, PredictionRecord};

const TITLE_EMOJIS: [&str; 5] = ["🚤", "💰", "🔥", "⚡", "🎯"];

/// Prediction broadcast for a selected bet
pub fn render_prediction(bet: &Bet) -> String {
    let race = &bet.race;
    let emoji = TITLE_EMOJIS[race.name.chars().count() % TITLE_EMOJIS.len()];

    let mut text = format!("🚤 ちょいアツ予想 {}\n\n", emoji);
    text.push_str(&format!("今夜は{}で攻めます！\n", race.name));
    text.push_str(&format!("⏰ {}〜\n", race.start_time));
    text.push_str(&format!("💰 予想配当: {}倍\n", race.expected_odds));
    text.push_str(&format!("🎯 買い目: {} ({})\n", bet.combination, bet.bet_type.label()));
    text.push_str(&format!("📈 信頼度: {:.0}%\n", bet.confidence * 100.0));
    text.push_str("\n熱くなりすぎず、ちょいアツで行きましょう✨");

    if !race.url.is_empty() {
        text.push_str(&format!("\n\nレース詳細: {}", race.url));
    }

    text
}

/// Headline and body for an outcome tier
fn tier_copy(tier: OutcomeTier, amount: u64) -> (&'static str, String) {
    match tier {
        OutcomeTier::MajorWin => (
            "🎉 大勝利！！ 🎉",
            format!("やりました！{}円GET！\n今夜は焼肉だ〜 🍖✨", amount),
        ),
        OutcomeTier::Win => (
            "🎯 的中！ 🎯",
            format!("ナイス！{}円GET！\nちょいアツ的中です 🔥", amount),
        ),
        OutcomeTier::SmallWin => (
            "✅ 的中",
            format!("{}円GET\nコツコツ行きましょう 💪", amount),
        ),
        OutcomeTier::Miss => (
            "💔 不的中",
            "今回は残念でした...\n次回に期待！切り替えて行きます 🔄".to_string(),
        ),
    }
}

/// Result broadcast for a resolved record; `None` while unresolved
pub fn render_result(record: &PredictionRecord) -> Option<String> {
    let amount = record.payout_amount?;
    let order = record.result_order.as_deref().unwrap_or_default();
    let (title, body) = tier_copy(OutcomeTier::from_amount(amount), amount);

    Some(format!(
        "{}\n\n📍 {}\n結果: {}\n買い目: {}\n\n{}",
        title,
        record.race_name,
        format_order(order),
        record.combination,
        body
    ))
}
