use super::pacing::Pacing;
use super::Scene;
use crate::api::GeminiClient;
use crate::config::Format;
use tracing::{info, warn};

const MIDDLE_LINES: &[(&str, &str)] = &[
    (
        "Deep shadows moving across {topic}, cinematic fog, dark moody lighting",
        "Deep in the shadows, something moves.",
    ),
    (
        "A sweeping wide shot of {topic} transformed, dramatic storm light",
        "The world of {topic} changed forever.",
    ),
    (
        "A lone silhouette facing {topic}, suspenseful atmosphere, film grain",
        "Nobody expected what happened next.",
    ),
    (
        "Hidden details of {topic} revealed in a shaft of light, mysterious",
        "The truth was hidden in plain sight.",
    ),
];

/// 分镜脚本生成：优先调用大模型，失败或数量不足时使用模板补齐
pub struct ScriptGenerator {
    client: Option<GeminiClient>,
}

impl ScriptGenerator {
    pub fn new(client: Option<GeminiClient>) -> Self {
        Self { client }
    }

    /// 始终返回恰好 `scene_count` 个分镜
    pub async fn generate(
        &self,
        topic: &str,
        scene_count: usize,
        pacing: &Pacing,
        format: Format,
    ) -> Vec<Scene> {
        let parsed = match &self.client {
            Some(client) => {
                let prompt = build_prompt(topic, scene_count, pacing, format);
                match client.generate_text(&prompt).await {
                    Ok(text) => parse_scenes(&text),
                    Err(e) => {
                        warn!("Script generation failed, using templates: {}", e);
                        Vec::new()
                    }
                }
            }
            None => {
                info!("No text-generation key configured, using templates");
                Vec::new()
            }
        };

        if parsed.len() < scene_count {
            info!(
                "Model returned {} of {} scenes, padding from templates",
                parsed.len(),
                scene_count
            );
        }

        fit_to_count(parsed, topic, scene_count)
    }
}

pub fn build_prompt(topic: &str, scene_count: usize, pacing: &Pacing, format: Format) -> String {
    let word_budget = pacing.word_budget;
    let words_each = pacing.words_per_scene(scene_count);
    format!(
        "Write a dark, cinematic {format} short video script about '{topic}'.\n\
         Produce exactly {scene_count} scenes and about {word_budget} narration words in total \
         (roughly {words_each} words per scene).\n\
         Output one scene per line and nothing else, using this exact format:\n\
         VISUAL: <detailed image description in English> | AUDIO: <narration sentence>",
        format = format.label(),
    )
}

/// 解析模型输出，每行得到一个（画面，旁白）对
pub fn parse_scenes(text: &str) -> Vec<(String, String)> {
    text.lines().filter_map(parse_line).collect()
}

fn parse_line(line: &str) -> Option<(String, String)> {
    let line = strip_list_marker(&line.replace('*', ""));
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    if let Some((visual, audio)) = line.split_once('|') {
        let visual = strip_label(visual, "VISUAL");
        let audio = strip_label(audio, "AUDIO");
        if visual.is_empty() || audio.is_empty() {
            return None;
        }
        return Some((visual, audio));
    }

    // 没有分隔符时，足够长的句子同时用作画面和旁白；以冒号结尾的是标题
    if line.chars().count() > 10 && !line.ends_with(':') {
        let sentence = strip_label(line, "AUDIO");
        return Some((sentence.clone(), sentence));
    }
    None
}

fn strip_list_marker(line: &str) -> String {
    let trimmed = line.trim_start();
    if let Some(rest) = trimmed.strip_prefix("- ") {
        return rest.to_string();
    }
    let digits = trimmed.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits > 0 {
        let rest = &trimmed[digits..];
        // 序号后必须跟空白，"3.5 billion" 不是序号
        if let Some(rest) = rest.strip_prefix('.').or_else(|| rest.strip_prefix(')')) {
            if rest.starts_with(char::is_whitespace) {
                return rest.to_string();
            }
        }
    }
    trimmed.to_string()
}

fn strip_label(part: &str, label: &str) -> String {
    let part = part.trim();
    let upper = part.to_ascii_uppercase();
    let rest = match upper.strip_prefix(label) {
        Some(after) if after.trim_start().starts_with(':') => {
            let consumed = part.len() - after.len();
            part[consumed..].trim_start().trim_start_matches(':')
        }
        _ => part,
    };
    rest.trim().trim_matches('"').trim().to_string()
}

/// 模板分镜：开场、中段轮换、结尾
pub fn template_scene(topic: &str, index: usize, scene_count: usize) -> (String, String) {
    if index == 0 {
        return (
            format!("Cinematic establishing shot of {}, dark moody lighting, 4k", topic),
            format!("The mystery of {} begins now.", topic),
        );
    }
    if index + 1 == scene_count {
        return (
            format!("Final haunting image of {}, fading light, epic composition", topic),
            "This is the end of the beginning.".to_string(),
        );
    }
    let (visual, audio) = MIDDLE_LINES[(index - 1) % MIDDLE_LINES.len()];
    (visual.replace("{topic}", topic), audio.replace("{topic}", topic))
}

/// 截断多余分镜，不足部分用模板补齐
pub fn fit_to_count(pairs: Vec<(String, String)>, topic: &str, scene_count: usize) -> Vec<Scene> {
    let mut pairs = pairs;
    pairs.truncate(scene_count);
    for index in pairs.len()..scene_count {
        pairs.push(template_scene(topic, index, scene_count));
    }

    pairs
        .into_iter()
        .enumerate()
        .map(|(i, (visual, audio))| Scene::new(i, visual, audio))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_delimited_lines() {
        let text = "Here is your script:\n\
                    1. VISUAL: A black abyss with glowing jellyfish | AUDIO: Below the waves, light fades.\n\
                    2) **VISUAL:** Giant squid silhouette | **AUDIO:** Something ancient stirs.\n\
                    - visual: Sunken ship | audio: \"Nothing returns.\"\n\
                    \n\
                    VISUAL: | AUDIO: empty visual is skipped";
        let scenes = parse_scenes(text);
        assert_eq!(scenes.len(), 3);
        assert_eq!(
            scenes[0],
            (
                "A black abyss with glowing jellyfish".to_string(),
                "Below the waves, light fades.".to_string()
            )
        );
        assert_eq!(scenes[1].0, "Giant squid silhouette");
        assert_eq!(scenes[1].1, "Something ancient stirs.");
        assert_eq!(scenes[2], ("Sunken ship".to_string(), "Nothing returns.".to_string()));
    }

    #[test]
    fn test_plain_sentences_become_both_parts() {
        let scenes = parse_scenes("The ocean keeps its secrets well.\nshort\n");
        assert_eq!(scenes.len(), 1);
        assert_eq!(scenes[0].0, scenes[0].1);
    }

    #[test]
    fn test_leading_numbers_are_not_list_markers() {
        let scenes = parse_scenes(
            "3.5 billion years ago, life stirred in the deep.\n\
             12) VISUAL: A trench at dusk | AUDIO: 11,000 meters down.",
        );
        assert_eq!(scenes.len(), 2);
        assert_eq!(scenes[0].0, "3.5 billion years ago, life stirred in the deep.");
        assert_eq!(scenes[0].1, scenes[0].0);
        assert_eq!(
            scenes[1],
            ("A trench at dusk".to_string(), "11,000 meters down.".to_string())
        );
    }

    #[test]
    fn test_fit_pads_with_templates() {
        let scenes = fit_to_count(
            vec![("v".to_string(), "a".to_string())],
            "The Deep Ocean",
            5,
        );
        assert_eq!(scenes.len(), 5);
        assert_eq!(scenes[0].visual_prompt, "v");
        assert_eq!(scenes[4].voiceover_text, "This is the end of the beginning.");
        assert!(scenes.iter().enumerate().all(|(i, s)| s.index == i));
        assert!(scenes[1].visual_prompt.contains("The Deep Ocean"));
    }

    #[test]
    fn test_fit_truncates_overflow() {
        let pairs = (0..9).map(|i| (format!("v{}", i), format!("a{}", i))).collect();
        let scenes = fit_to_count(pairs, "x", 3);
        assert_eq!(scenes.len(), 3);
        assert_eq!(scenes[2].voiceover_text, "a2");
    }

    #[test]
    fn test_templates_cover_any_count() {
        for n in 1..=12 {
            let scenes = fit_to_count(Vec::new(), "Mars", n);
            assert_eq!(scenes.len(), n);
            assert!(scenes[0].voiceover_text.contains("Mars"));
            assert!(scenes.iter().all(|s| !s.visual_prompt.is_empty()));
        }
    }

    #[test]
    fn test_prompt_mentions_count_and_budget() {
        let prompt = build_prompt("The Deep Ocean", 5, &Pacing::new(30.0, 5), Format::Vertical);
        assert!(prompt.contains("exactly 5 scenes"));
        assert!(prompt.contains("about 69 narration words"));
        assert!(prompt.contains("roughly 13 words per scene"));
        assert!(prompt.contains("vertical"));
    }

    #[tokio::test]
    async fn test_generate_without_client_yields_exact_count() {
        let generator = ScriptGenerator::new(None);
        let scenes = generator
            .generate("The Deep Ocean", 5, &Pacing::new(30.0, 5), Format::Vertical)
            .await;
        assert_eq!(scenes.len(), 5);
    }

    #[tokio::test]
    async fn test_generate_with_unreachable_endpoint_falls_back() {
        let client = GeminiClient::new(
            "key".into(),
            "http://127.0.0.1:9/v1beta".into(),
            "gemini-test".into(),
        )
        .unwrap();
        let generator = ScriptGenerator::new(Some(client));
        let scenes = generator
            .generate("The Deep Ocean", 6, &Pacing::new(36.0, 6), Format::Horizontal)
            .await;
        assert_eq!(scenes.len(), 6);
        assert_eq!(scenes[0].voiceover_text, "The mystery of The Deep Ocean begins now.");
    }
}
