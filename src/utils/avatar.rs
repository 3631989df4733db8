// 头像地址生成
// 纯函数，不访问网络；图片由渲染层加载

use reqwest::Url;
use serde::Serialize;

const AVATAR_BASE: &str = "https://api.dicebear.com/7.x";
const BACKGROUND_COLORS: &str = "b6e3f4,c0aede,d1f4cc,ffdfbf,ffd5dc";

/// 默认头像风格
pub const DEFAULT_STYLE: &str = "bottts";

/// 可选的头像风格
pub const STYLES: [&str; 8] = [
    "adventurer",
    "avataaars",
    "bottts",
    "fun-emoji",
    "lorelei",
    "notionists",
    "open-peeps",
    "personas",
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AvatarOption {
    pub style: String,
    pub url: String,
}

/// 根据种子和风格生成头像地址，未知风格使用默认风格
pub fn avatar_url(seed: &str, style: &str) -> String {
    let style = if STYLES.contains(&style) {
        style
    } else {
        DEFAULT_STYLE
    };
    let base = format!("{}/{}/svg", AVATAR_BASE, style);
    match Url::parse_with_params(&base, &[("seed", seed), ("backgroundColor", BACKGROUND_COLORS)])
    {
        Ok(url) => url.to_string(),
        // base 是常量拼接，不会解析失败
        Err(_) => base,
    }
}

/// 为群组名称生成所有风格的候选头像
pub fn avatar_options(name: &str) -> Vec<AvatarOption> {
    let seed = if name.trim().is_empty() { "default" } else { name };
    STYLES
        .iter()
        .map(|style| AvatarOption {
            style: style.to_string(),
            url: avatar_url(seed, style),
        })
        .collect()
}
