//! Health-profile summary used as prompt context for food analysis.

use chrono::{Datelike, NaiveDate};

use crate::models::UserProfile;

fn activity_label(level: &str) -> &str {
    match level {
        "sedentary" => "久坐",
        "light" => "轻度活动",
        "moderate" => "中度活动",
        "active" => "高度活动",
        "very_active" => "极高活动",
        other => other,
    }
}

pub fn age_from_birthday(birthday: NaiveDate, today: NaiveDate) -> i32 {
    let mut age = today.year() - birthday.year();
    if (today.month(), today.day()) < (birthday.month(), birthday.day()) {
        age -= 1;
    }
    age
}

/// Formats the owner's profile into a short Chinese summary block for the
/// model, or an empty string when nothing useful is on file.
pub fn health_profile_summary(user: &UserProfile) -> String {
    let mut basics = Vec::new();
    if let Some(gender) = &user.gender {
        basics.push(format!(
            "性别：{}",
            if gender == "male" { "男" } else { "女" }
        ));
    }
    if let Some(height) = user.height {
        basics.push(format!("身高 {:.0} cm", height));
    }
    if let Some(weight) = user.weight {
        basics.push(format!("体重 {:.1} kg", weight));
    }
    if let Some(birthday) = user.birthday {
        let age = age_from_birthday(birthday, chrono::Utc::now().date_naive());
        if age > 0 {
            basics.push(format!("年龄 {} 岁", age));
        }
    }

    let mut lines = Vec::new();
    if !basics.is_empty() {
        lines.push(format!("· {}", basics.join("  ")));
    }

    let activity = user
        .activity_level
        .as_deref()
        .map(activity_label)
        .unwrap_or("未填");
    lines.push(format!("· 活动水平：{}", activity));

    let hc = &user.health_condition;
    if !hc.medical_history.is_empty() {
        lines.push(format!("· 既往病史：{}", hc.medical_history.join("、")));
    }
    if !hc.diet_preference.is_empty() {
        lines.push(format!("· 饮食偏好：{}", hc.diet_preference.join("、")));
    }
    if !hc.allergies.is_empty() {
        lines.push(format!("· 过敏/忌口：{}", hc.allergies.join("、")));
    }

    if user.bmr.is_some() || user.tdee.is_some() {
        let bmr = user
            .bmr
            .map(|v| format!("{:.0} kcal/天", v))
            .unwrap_or_else(|| "未计算".to_string());
        let tdee = user
            .tdee
            .map(|v| format!("{:.0} kcal/天", v))
            .unwrap_or_else(|| "未计算".to_string());
        lines.push(format!(
            "· 基础代谢(BMR)：{}；每日总消耗(TDEE)：{}",
            bmr, tdee
        ));
    }

    if let Some(report) = &hc.report_extract {
        let mut summary = report.to_string();
        if summary.chars().count() > 500 {
            summary = summary.chars().take(500).collect::<String>() + "…";
        }
        lines.push(format!("· 体检/病历摘要：{}", summary));
    }

    if lines.len() == 1 && basics.is_empty() && user.activity_level.is_none() {
        // Only the placeholder activity line; nothing on file worth sending.
        return String::new();
    }
    format!("用户健康档案（供营养建议参考）：\n{}", lines.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::HealthCondition;

    fn empty_profile(id: &str) -> UserProfile {
        UserProfile {
            id: id.to_string(),
            nickname: String::new(),
            gender: None,
            height: None,
            weight: None,
            birthday: None,
            activity_level: None,
            health_condition: HealthCondition::default(),
            bmr: None,
            tdee: None,
        }
    }

    #[test]
    fn age_counts_completed_years() {
        let birthday = NaiveDate::from_ymd_opt(1990, 6, 15).unwrap();
        let before = NaiveDate::from_ymd_opt(2024, 6, 14).unwrap();
        let after = NaiveDate::from_ymd_opt(2024, 6, 15).unwrap();
        assert_eq!(age_from_birthday(birthday, before), 33);
        assert_eq!(age_from_birthday(birthday, after), 34);
    }

    #[test]
    fn empty_profile_yields_empty_summary() {
        assert_eq!(health_profile_summary(&empty_profile("u1")), "");
    }

    #[test]
    fn summary_includes_basics_and_allergies() {
        let mut profile = empty_profile("u1");
        profile.gender = Some("male".to_string());
        profile.height = Some(178.0);
        profile.weight = Some(72.5);
        profile.health_condition.allergies = vec!["花生".to_string(), "海鲜".to_string()];

        let summary = health_profile_summary(&profile);
        assert!(summary.contains("性别：男"));
        assert!(summary.contains("身高 178 cm"));
        assert!(summary.contains("体重 72.5 kg"));
        assert!(summary.contains("过敏/忌口：花生、海鲜"));
    }
}
