//! Prompt construction for the analysis processors. Hints and the resolved
//! health-profile summary are folded into fixed instruction templates.

use crate::models::AnalysisHints;

fn goal_label(goal: &str) -> &str {
    match goal {
        "muscle_gain" => "增肌",
        "fat_loss" => "减脂",
        "maintain" => "维持体重",
        other => other,
    }
}

fn diet_label(goal: &str) -> &str {
    match goal {
        "fat_loss" => "减脂期",
        "muscle_gain" => "增肌期",
        "maintain" => "维持体重",
        other => other,
    }
}

fn timing_label(timing: &str) -> &str {
    match timing {
        "post_workout" => "练后",
        "daily" => "日常",
        "before_sleep" => "睡前",
        other => other,
    }
}

fn meal_label(meal: &str) -> &str {
    match meal {
        "breakfast" => "早餐",
        "lunch" => "午餐",
        "dinner" => "晚餐",
        "snack" => "加餐",
        other => other,
    }
}

struct HintLines {
    goal: String,
    state: String,
    remaining: String,
    meal: String,
    additional: String,
}

fn hint_lines(hints: &AnalysisHints) -> HintLines {
    let goal = hints
        .user_goal
        .as_deref()
        .map(|g| {
            format!(
                "\n用户目标为「{}」，请在 pfc_ratio_comment 中评价本餐 P/C/F 占比是否适合该目标。",
                goal_label(g)
            )
        })
        .unwrap_or_default();

    let mut state_parts = Vec::new();
    if let Some(diet_goal) = hints.diet_goal.as_deref() {
        if diet_goal != "none" {
            state_parts.push(diet_label(diet_goal).to_string());
        }
    }
    if let Some(timing) = hints.activity_timing.as_deref() {
        if timing != "none" {
            state_parts.push(timing_label(timing).to_string());
        }
    }
    let state = if state_parts.is_empty() {
        String::new()
    } else {
        format!(
            "\n用户当前状态: {}，请在 context_advice 中给出针对性进食建议。",
            state_parts.join(" + ")
        )
    };

    let remaining = hints
        .remaining_calories
        .map(|kcal| {
            format!(
                "\n用户当日剩余热量预算约 {:.0} kcal，可在 context_advice 中提示本餐占比或下一餐建议。",
                kcal
            )
        })
        .unwrap_or_default();

    let meal = hints
        .meal_type
        .as_deref()
        .map(|m| {
            format!(
                "\n用户选择的是「{}」，请结合餐次特点在 insight 或 context_advice 中给出建议。",
                meal_label(m)
            )
        })
        .unwrap_or_default();

    let additional = hints
        .additional_context
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            format!(
                "\n用户补充背景信息: \"{}\"。请根据此信息调整对隐形成分或烹饪方式的判断。",
                s
            )
        })
        .unwrap_or_default();

    HintLines {
        goal,
        state,
        remaining,
        meal,
        additional,
    }
}

fn profile_section(profile_block: &str) -> String {
    if profile_block.is_empty() {
        return String::new();
    }
    format!(
        "\n\n若以下存在「用户健康档案」，请结合档案在 insight、absorption_notes、context_advice \
         中给出更贴合该用户体质与健康状况的建议。\n\n{}",
        profile_block
    )
}

const FOOD_RESULT_FORMAT: &str = r#"
重要：请务必使用**简体中文**返回所有文本内容。
请严格按照以下 JSON 格式返回，不要包含任何其他文本：

{
  "items": [
    {
      "name": "食物名称（简体中文）",
      "estimatedWeightGrams": 重量（数字）,
      "nutrients": { "calories", "protein", "carbs", "fat", "fiber", "sugar" }
    }
  ],
  "description": "餐食描述（简体中文）",
  "insight": "健康建议（简体中文）",
  "pfc_ratio_comment": "PFC 比例评价（简体中文，一两句话）",
  "absorption_notes": "吸收率/生物利用度说明（简体中文，一两句话）",
  "context_advice": "情境建议（简体中文，若无则空字符串）"
}"#;

pub fn food_image_prompt(hints: &AnalysisHints, profile_block: &str) -> String {
    let h = hint_lines(hints);
    format!(
        "请作为专业的营养师分析这些食物图片。\n\
         1. 识别图中所有不同的食物单品。\n\
         2. 估算每种食物的重量（克）和详细营养成分。\n\
         3. description: 提供这顿饭的简短中文描述。\n\
         4. insight: 基于该餐营养成分的一句话健康建议。{meal}\n\
         5. pfc_ratio_comment: 本餐蛋白质(P)、脂肪(F)、碳水(C) 占比的简要评价（是否均衡、适合增肌/减脂/维持）。{goal}\n\
         6. absorption_notes: 食物组合或烹饪方式对吸收率、生物利用度的简要说明（一两句话）。\n\
         7. context_advice: 结合用户状态或剩余热量的情境建议（若无则可为空字符串）。{state}{remaining}{profile}{additional}\n\
         {format}",
        meal = h.meal,
        goal = h.goal,
        state = h.state,
        remaining = h.remaining,
        profile = profile_section(profile_block),
        additional = h.additional,
        format = FOOD_RESULT_FORMAT,
    )
}

pub fn food_text_prompt(text_input: &str, hints: &AnalysisHints, profile_block: &str) -> String {
    let h = hint_lines(hints);
    format!(
        "请作为专业的营养师分析用户描述的食物。\n\n\
         用户描述：{text_input}\n\n\
         任务：\n\
         1. 识别描述中的所有食物单品。\n\
         2. 估算每种食物的合理重量（克）和详细营养成分。\n\
         3. description: 提供这顿饭的简短中文描述。\n\
         4. insight: 基于该餐营养成分的一句话健康建议。{meal}\n\
         5. pfc_ratio_comment: 本餐蛋白质(P)、脂肪(F)、碳水(C) 占比的简要评价（是否均衡、适合增肌/减脂/维持）。{goal}\n\
         6. absorption_notes: 食物组合或烹饪方式对吸收率、生物利用度的简要说明（一两句话）。\n\
         7. context_advice: 结合用户状态或剩余热量的情境建议（若无则可为空字符串）。{state}{remaining}{profile}{additional}\n\
         {format}",
        meal = h.meal,
        goal = h.goal,
        state = h.state,
        remaining = h.remaining,
        profile = profile_section(profile_block),
        additional = h.additional,
        format = FOOD_RESULT_FORMAT,
    )
}

pub fn health_report_prompt() -> String {
    "请识别这张体检报告或病例截图中的健康相关信息。\n\
     请用简体中文，按以下 JSON 格式返回（若某项无法识别则填空数组或空字符串）：\n\
     {\n\
       \"indicators\": [{\"name\": \"指标名称\", \"value\": \"数值\", \"unit\": \"单位\"}],\n\
       \"conclusions\": [\"结论1\", \"结论2\"],\n\
       \"suggestions\": [\"建议1\"],\n\
       \"medical_notes\": \"其他与病史、过敏、饮食禁忌相关的文字摘要\"\n\
     }\n\
     只返回上述 JSON，不要其他说明。"
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hints_are_folded_into_the_prompt() {
        let hints = AnalysisHints {
            user_goal: Some("fat_loss".to_string()),
            diet_goal: Some("fat_loss".to_string()),
            activity_timing: Some("post_workout".to_string()),
            remaining_calories: Some(850.0),
            meal_type: Some("dinner".to_string()),
            additional_context: Some("汤里有猪油".to_string()),
            model_name: None,
        };
        let prompt = food_image_prompt(&hints, "");
        assert!(prompt.contains("减脂"));
        assert!(prompt.contains("减脂期 + 练后"));
        assert!(prompt.contains("850 kcal"));
        assert!(prompt.contains("晚餐"));
        assert!(prompt.contains("汤里有猪油"));
    }

    #[test]
    fn none_hints_are_omitted() {
        let hints = AnalysisHints {
            diet_goal: Some("none".to_string()),
            activity_timing: Some("none".to_string()),
            ..Default::default()
        };
        let prompt = food_text_prompt("一碗白米饭", &hints, "");
        assert!(!prompt.contains("用户当前状态"));
        assert!(!prompt.contains("用户目标"));
        assert!(prompt.contains("一碗白米饭"));
    }

    #[test]
    fn profile_block_is_included_when_present() {
        let prompt = food_image_prompt(&AnalysisHints::default(), "用户健康档案（供营养建议参考）：\n· 活动水平：久坐");
        assert!(prompt.contains("用户健康档案"));
    }
}
