use std::collections::BTreeSet;

use crate::engine::OutputJar;
use crate::relocate::RelocationSet;

use super::{ResourceTransformer, TransformContext};

const NOTICE_PATH: &str = "META-INF/NOTICE";
const NOTICE_TXT_PATH: &str = "META-INF/NOTICE.txt";

const PREAMBLE_1: &str = "// ------------------------------------------------------------------\n\
// NOTICE file corresponding to the section 4d of The Apache License,\n\
// Version 2.0, in this case for ";
const PREAMBLE_2: &str = "\n// ------------------------------------------------------------------\n";
const PREAMBLE_3: &str = "This product includes software developed at\n";
const BUNDLE_MARKER: &str = "This product includes/uses software(s) developed by";

/// Merges Apache `NOTICE` files: blank-line separated blocks are collected
/// once each, `- `-bulleted contributions are grouped under their
/// organization heading and the project's own copyright block floats to
/// the top of the merged file.
pub struct ApacheNoticeResourceTransformer {
    project_name: String,
    organization_name: String,
    organization_url: String,
    inception_year: String,
    add_header: bool,
    copyright: Option<String>,
    entries: Vec<String>,
    organization_entries: Vec<(String, BTreeSet<String>)>,
}

impl ApacheNoticeResourceTransformer {
    pub fn new(project_name: &str) -> Self {
        Self {
            project_name: project_name.to_string(),
            organization_name: "The Apache Software Foundation".to_string(),
            organization_url: "https://www.apache.org/".to_string(),
            inception_year: "2006".to_string(),
            add_header: true,
            copyright: None,
            entries: Vec::new(),
            organization_entries: Vec::new(),
        }
    }

    pub fn organization(mut self, name: &str, url: &str) -> Self {
        self.organization_name = name.to_string();
        self.organization_url = url.to_string();
        self
    }

    pub fn inception_year(mut self, year: &str) -> Self {
        self.inception_year = year.to_string();
        self
    }

    fn push_entry(&mut self, entry: String) {
        if !self.entries.contains(&entry) {
            self.entries.push(entry);
        }
    }

    fn org_index(&mut self, key: &str) -> usize {
        if let Some(i) = self.organization_entries.iter().position(|(k, _)| k == key) {
            return i;
        }
        self.organization_entries
            .push((key.to_string(), BTreeSet::new()));
        self.organization_entries.len() - 1
    }

    fn seed_header(&mut self) {
        if self.add_header {
            self.push_entry(format!(
                "{PREAMBLE_1}{}{PREAMBLE_2}",
                self.project_name
            ));
        } else {
            self.push_entry(String::new());
        }
        // Placeholder copyright block, replaced when an input carries a
        // real one for this project.
        self.push_entry(format!(
            "{}\nCopyright {} {}\n",
            self.project_name, self.inception_year, self.organization_name
        ));
        self.push_entry(format!(
            "{PREAMBLE_3}{} ({}).\n",
            self.organization_name, self.organization_url
        ));
    }
}

impl ResourceTransformer for ApacheNoticeResourceTransformer {
    fn can_transform_resource(&self, path: &str) -> bool {
        path.eq_ignore_ascii_case(NOTICE_PATH) || path.eq_ignore_ascii_case(NOTICE_TXT_PATH)
    }

    fn transform(&mut self, context: TransformContext<'_>) -> anyhow::Result<()> {
        if self.entries.is_empty() {
            self.seed_header();
        }

        let text = String::from_utf8_lossy(context.data);
        let mut block = String::new();
        let mut current_org: Option<usize> = None;
        let mut line_count = 0;
        for line in text.lines() {
            let trimmed = line.trim();
            if trimmed.starts_with("//") {
                continue;
            }
            if !trimmed.is_empty() {
                if trimmed.starts_with("- ") {
                    if line_count == 1 && block.contains(BUNDLE_MARKER) {
                        current_org = Some(self.org_index(block.trim()));
                        block.clear();
                    } else if !block.is_empty() {
                        if let Some(org) = current_org {
                            self.organization_entries[org].1.insert(block.clone());
                            block.clear();
                        }
                    }
                }
                block.push_str(line);
                block.push('\n');
                line_count += 1;
            } else {
                if block.starts_with(&self.project_name) && block.contains("Copyright ") {
                    self.copyright = Some(block.clone());
                }
                match current_org {
                    None => self.push_entry(block.clone()),
                    Some(org) => {
                        self.organization_entries[org].1.insert(block.clone());
                    }
                }
                block.clear();
                line_count = 0;
                current_org = None;
            }
        }
        if !block.is_empty() {
            match current_org {
                None => self.push_entry(block),
                Some(org) => {
                    self.organization_entries[org].1.insert(block);
                }
            }
        }
        Ok(())
    }

    fn has_transformed_resource(&self) -> bool {
        true
    }

    fn modify_output(
        &mut self,
        output: &mut OutputJar,
        _relocations: &RelocationSet,
    ) -> anyhow::Result<()> {
        let mut text = String::new();
        let mut count = 0;
        for entry in &self.entries {
            count += 1;
            if Some(entry) == self.copyright.as_ref() && count != 2 {
                continue;
            }
            if count == 2 && self.copyright.is_some() {
                text.push_str(self.copyright.as_deref().unwrap_or_default());
            } else {
                text.push_str(entry);
            }
            text.push('\n');
            if count == 3 {
                for (org, contributions) in &self.organization_entries {
                    text.push_str(org);
                    text.push('\n');
                    for contribution in contributions {
                        text.push_str(contribution);
                    }
                    text.push('\n');
                }
            }
        }
        output.put_file(NOTICE_PATH, text.as_bytes(), None)?;
        self.entries.clear();
        self.organization_entries.clear();
        self.copyright = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(t: &mut ApacheNoticeResourceTransformer, data: &[u8]) {
        let none = RelocationSet::default();
        t.transform(TransformContext {
            path: NOTICE_PATH.to_string(),
            data,
            relocations: &none,
        })
        .unwrap();
    }

    #[test]
    fn matches_both_notice_spellings() {
        let t = ApacheNoticeResourceTransformer::new("demo");
        assert!(t.can_transform_resource("META-INF/NOTICE"));
        assert!(t.can_transform_resource("META-INF/notice.TXT"));
        assert!(!t.can_transform_resource("META-INF/LICENSE"));
    }

    #[test]
    fn duplicate_blocks_are_collected_once() {
        let mut t = ApacheNoticeResourceTransformer::new("demo");
        feed(&mut t, b"Some dependency notice.\n\nShared block.\n");
        feed(&mut t, b"Shared block.\n\nAnother notice.\n");
        let shared: Vec<&String> = t
            .entries
            .iter()
            .filter(|e| e.contains("Shared block."))
            .collect();
        assert_eq!(shared.len(), 1);
    }

    #[test]
    fn project_copyright_block_is_hoisted() {
        let mut t = ApacheNoticeResourceTransformer::new("demo");
        feed(
            &mut t,
            b"demo product\nCopyright 2019 Example Org\n\nOther block.\n",
        );
        assert!(t.copyright.as_deref().unwrap().contains("Copyright 2019"));
    }

    #[test]
    fn bundled_contributions_group_under_their_organization() {
        let mut t = ApacheNoticeResourceTransformer::new("demo");
        feed(
            &mut t,
            b"This product includes/uses software(s) developed by Example Org\n- Widget, (c) 2020\n- Gadget, (c) 2021\n",
        );
        assert_eq!(t.organization_entries.len(), 1);
        let (org, contributions) = &t.organization_entries[0];
        assert!(org.contains("Example Org"));
        assert_eq!(contributions.len(), 2);
    }

    #[test]
    fn comment_lines_are_skipped() {
        let mut t = ApacheNoticeResourceTransformer::new("demo");
        feed(&mut t, b"// generator comment\nReal content.\n");
        assert!(t.entries.iter().any(|e| e.contains("Real content.")));
        assert!(!t
            .entries
            .iter()
            .any(|e| e.contains("generator comment") && !e.starts_with("//")));
    }
}
