//! 从文件名中提取作品标题，用于决定目标子目录

use regex::Regex;
use std::path::Path;

/// 标题提取接口
///
/// 尽力而为：无法识别时返回空字符串，调用方会退回到目标根目录。
pub trait TitleExtractor: Send + Sync {
    fn extract_title(&self, relative_name: &Path) -> String;
}

/// 不提取标题
#[derive(Debug, Default, Clone, Copy)]
pub struct NoTitle;

impl TitleExtractor for NoTitle {
    fn extract_title(&self, _relative_name: &Path) -> String {
        String::new()
    }
}

/// 解析常见的发布命名，如 `[Group] Title - 01 (1080p) [CRC].mkv`、`Title.S01E02.1080p.mkv`
#[derive(Debug, Clone)]
pub struct ReleaseTitleExtractor {
    brackets: Option<Regex>,
    episode: Option<Regex>,
}

impl ReleaseTitleExtractor {
    pub fn new() -> Self {
        Self {
            brackets: Regex::new(r"\[[^\]]*\]|\([^)]*\)|\{[^}]*\}").ok(),
            episode: Regex::new(
                r"(?i)(\s-\s*\d{1,4}(v\d)?\b|\bS\d{1,2}E\d{1,4}\b|\bS\d{1,2}\b|\bEp?\s?\d{1,4}\b|\b(480|576|720|1080|2160)[pi]\b)",
            )
            .ok(),
        }
    }

    /// 去掉看起来像媒体扩展名的后缀
    fn strip_extension(name: &str) -> &str {
        let path = Path::new(name);
        let looks_like_ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| (2..=4).contains(&e.len()) && e.chars().all(|c| c.is_ascii_alphanumeric()))
            .unwrap_or(false);
        if looks_like_ext {
            path.file_stem().and_then(|s| s.to_str()).unwrap_or(name)
        } else {
            name
        }
    }
}

impl Default for ReleaseTitleExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl TitleExtractor for ReleaseTitleExtractor {
    fn extract_title(&self, relative_name: &Path) -> String {
        let Some(name) = relative_name.file_name().and_then(|n| n.to_str()) else {
            return String::new();
        };

        let mut text = Self::strip_extension(name).to_string();

        if let Some(re) = &self.brackets {
            text = re.replace_all(&text, " ").into_owned();
        }

        // 点号/下划线分隔的命名
        if !text.trim().contains(' ') {
            text = text.replace(['.', '_'], " ");
        }

        if let Some(m) = self.episode.as_ref().and_then(|re| re.find(&text)) {
            text.truncate(m.start());
        }

        text.split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .trim_end_matches(|c: char| c == '-' || c.is_whitespace())
            .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn title(name: &str) -> String {
        ReleaseTitleExtractor::new().extract_title(Path::new(name))
    }

    #[test]
    fn fansub_release_names() {
        assert_eq!(
            title("[SubsPlease] Sousou no Frieren - 01 (1080p) [ABCD1234].mkv"),
            "Sousou no Frieren"
        );
        assert_eq!(title("[Group] Mob Psycho 100 - 12v2 [720p].mkv"), "Mob Psycho 100");
    }

    #[test]
    fn dotted_scene_names() {
        assert_eq!(title("Some.Show.S01E02.1080p.WEB.mkv"), "Some Show");
        assert_eq!(title("Another_Show_E05_720p.mp4"), "Another Show");
    }

    #[test]
    fn uses_final_component_only() {
        assert_eq!(title("incoming/[G] Title - 03.mkv"), "Title");
    }

    #[test]
    fn nothing_left_is_empty() {
        assert_eq!(title("[Group] (1080p).mkv"), "");
        assert_eq!(NoTitle.extract_title(Path::new("x.mkv")), "");
    }
}
