// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Prompt assembly for the narrative, scene and image generation steps.
//!
//! Everything here is pure: the only source of variation is the RNG passed
//! to [`sample_events`].

use crate::models::diary::CALM_SOL_EVENT;
use rand::seq::SliceRandom;
use rand::Rng;

/// Flavor events that may be woven into a generated diary.
pub const MARS_EVENTS: [&str; 8] = [
    "全球尘暴预警Level-3（低压红尘）",
    "0.38G跳跃球联赛开幕（半重力乐园）",
    "Hydro-Credit汇率波动+15%（资源即货币）",
    "真空管列车系统维护",
    "Hab-Dome气压异常检测",
    "极地冰矿站产量下降",
    "太阳风辐射屏蔽升级",
    "Regolith土壤脱毒实验成功",
];

/// Upper bound (inclusive) on events per generation.
pub const MAX_EVENTS: usize = 2;

/// Maximum characters kept from the scene extraction step.
pub const MAX_SCENE_CHARS: usize = 120;

const STYLE_SUFFIX: &str = "Mars colony daily life, red planet landscape, \
habitat domes, cinematic lighting, highly detailed digital painting, \
science fiction concept art";

const NEGATIVE_PROMPT: &str =
    "text, watermark, logo, signature, blurry, low quality, deformed, extra limbs";

/// Final prompt pair sent to the image model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePrompt {
    pub prompt: String,
    pub negative_prompt: String,
}

/// Pick 0..=2 distinct events from the catalog.
pub fn sample_events<R: Rng>(rng: &mut R) -> Vec<&'static str> {
    let count = rng.gen_range(0..=MAX_EVENTS);
    let mut shuffled = MARS_EVENTS.to_vec();
    shuffled.shuffle(rng);
    shuffled.truncate(count);
    shuffled
}

/// Display string stored alongside the diary.
pub fn describe_events(events: &[&str]) -> String {
    if events.is_empty() {
        CALM_SOL_EVENT.to_string()
    } else {
        events.join("、")
    }
}

/// Build the narrative prompt for one Earth diary.
pub fn build_mars_prompt(earth_diary: &str, sol_number: u64, events: &[&str]) -> String {
    let events_line = if events.is_empty() {
        String::new()
    } else {
        format!("\n今日环境事件：{}", events.join("、"))
    };

    format!(
        "你是一位生活在火星上的「我」（第一人称，中文）。请根据以下世界观设定与映射规则，撰写一篇250字左右的《火星日记》，并用信件形式结尾署名\"— Sol‑{sol_number} 的你\"。

世界观三大支柱（所有内容都应扣在这三件事上）：
A. 低压红尘（环境差异）：0.6% 地表气压、95% CO₂ 气氛、24h 39m 的Sol、尘暴可遮天数周
B. 半重力乐园（身体差异）：表面重力 0.38g，跳跃高度≈地球2.6×，运动方式/建筑尺度全被改写
C. 资源即货币（经济差异）：水冰、光照、封装空气、辐射屏蔽材质＝硬通货；每件事都围着\"存活&制氧\"打转{events_line}

核心映射词典（地球元素 → 火星镜像）：
住宅：公寓 → Hab-Dome单元（透光ETFE膜+冰水墙阻辐射）
交通：汽车 → Rover Pod（6轮履带）、地铁 → 真空管列车（600km/h）
天气：下雨 → 二氧化碳雪（碳霜）、台风 → 全球尘暴（每6-8年一次）
动物：猫 → 低重力沙丘虎（长四肢、膜状尾巴）
植物：盆栽 → Hydro-Bamboo（光照强、CO₂高→超速光合）
工作：农民 → Regolith土壤学家、程序员 → 轨道网格工程师、咖啡师 → 气闸咖啡管理员
娱乐：足球 → 0.38G跳跃球（球门竖三层）、音乐会 → 峡谷回声秀
经济：美元 → Hydro-Credit（1HC=1L纯水）

写作要求：
1. 严格按照映射词典进行\"地球元素 → 火星对应\"转换
2. 每段必须体现A/B/C三大支柱中至少一个环境细节
3. 保留用户原文的情绪基调，结合火星环境放大或调和
4. 文体：亲笔信/日志；使用冷淡、硬科幻、略带魔幻感的语言
5. 结尾用一两句富含希望或反思的评论，并署名

用户输入：
{earth_diary}"
    )
}

/// Ask for a single concrete visual scene from a generated narrative.
pub fn build_scene_prompt(mars_diary: &str) -> String {
    format!(
        "请从下面这篇火星日记中提取一个最有画面感的场景，用不超过60个汉字描述画面中的人物、\
动作、环境与光线。只输出场景描述本身，不要解释，不要加引号。

火星日记：
{mars_diary}"
    )
}

/// Ask for an English rendering of the scene suitable for an image model.
pub fn build_translation_prompt(scene: &str) -> String {
    format!(
        "Translate the following Chinese scene description into concise, vivid English \
suitable as a text-to-image prompt. Output only the English translation, with no \
quotes or commentary.

{scene}"
    )
}

/// Combine the translated scene with the fixed style and negative prompt.
pub fn build_image_prompt(translated_scene: &str) -> ImagePrompt {
    let scene = translated_scene.trim().trim_end_matches(['.', ',']);
    ImagePrompt {
        prompt: format!("{scene}, {STYLE_SUFFIX}"),
        negative_prompt: NEGATIVE_PROMPT.to_string(),
    }
}

/// Trim model output for the scene step and cap its length.
pub fn clean_scene(raw: &str) -> String {
    raw.trim()
        .trim_matches(|c: char| c == '"' || c == '“' || c == '”')
        .chars()
        .take(MAX_SCENE_CHARS)
        .collect()
}
