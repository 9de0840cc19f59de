use snapsize_core::models::{FolderOrganization, NamingPolicy, SizeLabel};
use std::collections::HashSet;

/// Archive path of one variant.
///
/// `base` is the source file name without its extension. With `flat` folders and an
/// omitted original name, a prefix or suffix brings the base name back so entries from
/// different sources stay distinct.
pub fn entry_path(
    base: &str,
    label: SizeLabel,
    ext: &str,
    naming: &NamingPolicy,
    folders: FolderOrganization,
) -> String {
    let (p, s) = (naming.prefix.as_str(), naming.suffix.as_str());
    let omit = naming.omit_original_name;

    match folders {
        FolderOrganization::ByOriginal => {
            let file = if omit {
                format!("{p}{label}{s}")
            } else {
                format!("{p}{base}{s}_{label}")
            };
            format!("{base}/{file}.{ext}")
        }
        FolderOrganization::BySize => {
            let file = if omit {
                format!("{p}{base}{s}")
            } else {
                format!("{p}{base}{s}_{label}")
            };
            format!("{label}/{file}.{ext}")
        }
        FolderOrganization::Flat if omit && naming.has_affix() => {
            format!("{p}{base}_{label}{s}.{ext}")
        }
        FolderOrganization::Flat if omit => format!("{p}{label}{s}.{ext}"),
        FolderOrganization::Flat => format!("{p}{base}{s}_{label}.{ext}"),
    }
}

/// Hands out unique entry paths for one archive.
///
/// The first claim of a path keeps it exactly; later claims get `-2`, `-3`, ... appended
/// to the file stem.
#[derive(Debug, Default)]
pub struct EntryNamer {
    used: HashSet<String>,
}

impl EntryNamer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn claim(&mut self, path: String) -> String {
        if self.used.insert(path.clone()) {
            return path;
        }

        let file_start = path.rfind('/').map_or(0, |slash| slash + 1);
        let (stem, ext) = match path.rfind('.') {
            Some(dot) if dot > file_start => path.split_at(dot),
            _ => (path.as_str(), ""),
        };

        let mut n = 2;
        loop {
            let candidate = format!("{}-{}{}", stem, n, ext);
            if self.used.insert(candidate.clone()) {
                return candidate;
            }
            n += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(omit: bool, prefix: &str, suffix: &str) -> NamingPolicy {
        NamingPolicy {
            omit_original_name: omit,
            prefix: prefix.to_string(),
            suffix: suffix.to_string(),
        }
    }

    #[test]
    fn test_reference_vectors() {
        assert_eq!(
            entry_path(
                "photo",
                SizeLabel::M,
                "jpg",
                &policy(false, "", ""),
                FolderOrganization::ByOriginal
            ),
            "photo/photo_m.jpg"
        );
        assert_eq!(
            entry_path(
                "photo",
                SizeLabel::M,
                "jpg",
                &policy(true, "thumb_", ""),
                FolderOrganization::Flat
            ),
            "thumb_photo_m.jpg"
        );
        assert_eq!(
            entry_path(
                "photo",
                SizeLabel::M,
                "jpg",
                &policy(true, "", ""),
                FolderOrganization::BySize
            ),
            "m/photo.jpg"
        );
    }

    #[test]
    fn test_affixes_in_every_layout() {
        let naming = policy(false, "p-", "-s");
        assert_eq!(
            entry_path("cat", SizeLabel::Xs, "webp", &naming, FolderOrganization::ByOriginal),
            "cat/p-cat-s_xs.webp"
        );
        assert_eq!(
            entry_path("cat", SizeLabel::Xs, "webp", &naming, FolderOrganization::BySize),
            "xs/p-cat-s_xs.webp"
        );
        assert_eq!(
            entry_path("cat", SizeLabel::Xs, "webp", &naming, FolderOrganization::Flat),
            "p-cat-s_xs.webp"
        );

        let omitted = policy(true, "p-", "-s");
        assert_eq!(
            entry_path("cat", SizeLabel::L, "png", &omitted, FolderOrganization::ByOriginal),
            "cat/p-l-s.png"
        );
        assert_eq!(
            entry_path("cat", SizeLabel::L, "png", &omitted, FolderOrganization::Flat),
            "p-cat_l-s.png"
        );
    }

    #[test]
    fn test_flat_omitted_without_affix_is_label_only() {
        assert_eq!(
            entry_path(
                "cat",
                SizeLabel::Xl,
                "avif",
                &policy(true, "", ""),
                FolderOrganization::Flat
            ),
            "xl.avif"
        );
    }

    #[test]
    fn test_namer_disambiguates_collisions() {
        let mut namer = EntryNamer::new();
        assert_eq!(namer.claim("m.jpg".to_string()), "m.jpg");
        assert_eq!(namer.claim("m.jpg".to_string()), "m-2.jpg");
        assert_eq!(namer.claim("m.jpg".to_string()), "m-3.jpg");
        assert_eq!(namer.claim("a.b/photo".to_string()), "a.b/photo");
        assert_eq!(namer.claim("a.b/photo".to_string()), "a.b/photo-2");
    }
}
