use crate::backend::PlanSummary;

const ANGRY_MOM_WARNING: &str = "\n\n[Chế độ Angry Mom] Này này! Chi tiêu kiểu này là đi sai plan \
     rồi đó nha. Cắt bớt ăn uống, dừng quẹt thẻ vô tội vạ, ưu tiên tự nấu ở nhà và hoàn thành \
     nhiệm vụ ngày hôm nay. Nghe rõ chưa?";

/// Parse an operator-supplied amount. Accepts plain numbers and digit strings
/// with Vietnamese thousands separators ("50.000", "50,000", "1 200 000").
pub fn parse_amount(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if looks_grouped(trimmed) {
        let digits: String = trimmed
            .chars()
            .filter(|c| c.is_ascii_digit())
            .collect();
        return digits.parse().ok();
    }
    trimmed.parse().ok()
}

/// True for digit strings whose separators form thousands groups, e.g.
/// "50.000" but not "49.5" (a plain decimal).
fn looks_grouped(s: &str) -> bool {
    let parts: Vec<&str> = s.split([',', '.', ' ']).collect();
    if parts.len() < 2 {
        return false;
    }
    let head_ok = (1..=3).contains(&parts[0].len());
    head_ok
        && parts
            .iter()
            .all(|p| !p.is_empty() && p.chars().all(|c| c.is_ascii_digit()))
        && parts[1..].iter().all(|p| p.len() == 3)
}

/// Format an amount the Vietnamese way: rounded, '.' thousands separators.
pub fn format_vnd(amount: f64) -> String {
    let n = amount.round() as i64;
    let digits = n.abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(c);
    }
    if n < 0 {
        format!("-{grouped}")
    } else {
        grouped
    }
}

/// The base spend-notification message sent to the backend on behalf of the
/// user, e.g. "Mình vừa chi tiêu 50.000 VND cho cà phê. Cập nhật giúp nhé."
pub fn compose_spend_message(raw_amount: &str, amount: Option<f64>, note: &str) -> String {
    let mut msg = match amount {
        Some(amt) => format!("Mình vừa chi tiêu {} VND", format_vnd(amt)),
        None => format!("Mình vừa chi tiêu {raw_amount}"),
    };
    if !note.is_empty() {
        msg.push_str(&format!(" cho {note}"));
    }
    msg.push_str(". Cập nhật giúp nhé.");
    msg
}

/// A plan-vs-actual annotation derived from the dashboard summary.
/// The boolean is true when today's spend exceeds the daily target.
pub fn plan_note(summary: &PlanSummary, amount: Option<f64>) -> Option<(String, bool)> {
    if let Some(rec_week) = summary.recommended_weekly_save {
        let daily_target = rec_week / 7.0;
        let header = format!(
            "Theo kế hoạch ~{} VND/tuần (~{} VND/ngày).",
            format_vnd(rec_week),
            format_vnd(daily_target)
        );
        return Some(match amount {
            Some(amt) => {
                let over = amt - daily_target;
                if over > 0.0 {
                    (
                        format!(
                            "{header} Hôm nay mình đang vượt khoảng {} VND.",
                            format_vnd(over)
                        ),
                        true,
                    )
                } else {
                    (
                        format!(
                            "{header} Hôm nay vẫn trong mức (dư {} VND).",
                            format_vnd(over.abs())
                        ),
                        false,
                    )
                }
            }
            None => (header, false),
        });
    }

    if let Some(weekly_cap) = summary.weekly_cap_save {
        return Some((
            format!(
                "Dư địa tuần tối đa ~{} VND (~{} VND/ngày).",
                format_vnd(weekly_cap),
                format_vnd(weekly_cap / 7.0)
            ),
            false,
        ));
    }

    None
}

/// Attach the plan annotation (and, when over budget, the scolding block)
/// to the base spend message.
pub fn enrich_spend_message(base: &str, plan: Option<(String, bool)>) -> String {
    match plan {
        Some((note, over_budget)) => {
            let warning = if over_budget { ANGRY_MOM_WARNING } else { "" };
            format!(
                "{base}\n{note}{warning}\nNhờ nhắc nếu mình lệch kế hoạch và gợi ý cách cân đối \
                 lại cho ngày/tuần này nhé."
            )
        }
        None => base.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_amount_plain_and_separated() {
        assert_eq!(parse_amount("50000"), Some(50000.0));
        assert_eq!(parse_amount("50.000"), Some(50000.0));
        assert_eq!(parse_amount("50,000"), Some(50000.0));
        assert_eq!(parse_amount("1 200 000"), Some(1200000.0));
        assert_eq!(parse_amount("49.5"), Some(49.5));
        assert_eq!(parse_amount("một trăm"), None);
        assert_eq!(parse_amount(""), None);
    }

    #[test]
    fn test_format_vnd_groups_by_three() {
        assert_eq!(format_vnd(0.0), "0");
        assert_eq!(format_vnd(999.0), "999");
        assert_eq!(format_vnd(50000.0), "50.000");
        assert_eq!(format_vnd(1234567.0), "1.234.567");
        assert_eq!(format_vnd(-50000.0), "-50.000");
        assert_eq!(format_vnd(49999.6), "50.000");
    }

    #[test]
    fn test_compose_spend_message() {
        assert_eq!(
            compose_spend_message("50000", Some(50000.0), "cà phê"),
            "Mình vừa chi tiêu 50.000 VND cho cà phê. Cập nhật giúp nhé."
        );
        assert_eq!(
            compose_spend_message("một ít", None, ""),
            "Mình vừa chi tiêu một ít. Cập nhật giúp nhé."
        );
    }

    #[test]
    fn test_plan_note_over_budget() {
        let summary = PlanSummary {
            recommended_weekly_save: Some(700000.0),
            weekly_cap_save: None,
        };
        let (note, over) = plan_note(&summary, Some(150000.0)).unwrap();
        assert!(over);
        assert!(note.contains("700.000 VND/tuần"));
        assert!(note.contains("100.000 VND/ngày"));
        assert!(note.contains("vượt khoảng 50.000 VND"));
    }

    #[test]
    fn test_plan_note_within_budget() {
        let summary = PlanSummary {
            recommended_weekly_save: Some(700000.0),
            weekly_cap_save: None,
        };
        let (note, over) = plan_note(&summary, Some(60000.0)).unwrap();
        assert!(!over);
        assert!(note.contains("dư 40.000 VND"));
    }

    #[test]
    fn test_plan_note_weekly_cap_fallback() {
        let summary = PlanSummary {
            recommended_weekly_save: None,
            weekly_cap_save: Some(140000.0),
        };
        let (note, over) = plan_note(&summary, Some(999999.0)).unwrap();
        assert!(!over);
        assert!(note.contains("Dư địa tuần tối đa ~140.000 VND"));
    }

    #[test]
    fn test_plan_note_empty_summary() {
        let summary = PlanSummary {
            recommended_weekly_save: None,
            weekly_cap_save: None,
        };
        assert!(plan_note(&summary, Some(1.0)).is_none());
    }

    #[test]
    fn test_enrich_adds_warning_only_when_over() {
        let base = "Mình vừa chi tiêu 150.000 VND. Cập nhật giúp nhé.";
        let enriched = enrich_spend_message(base, Some(("plan".to_string(), true)));
        assert!(enriched.contains("[Chế độ Angry Mom]"));

        let enriched = enrich_spend_message(base, Some(("plan".to_string(), false)));
        assert!(!enriched.contains("[Chế độ Angry Mom]"));
        assert!(enriched.contains("Nhờ nhắc nếu mình lệch kế hoạch"));

        assert_eq!(enrich_spend_message(base, None), base);
    }
}
