//! Small, idempotent edits of a [`Config`].
//!
//! None of these touch the filesystem; they only change the in-memory tree.
use crate::{
    document::{Config, File, NodeUser, Resource, Unit},
    source::ContentSource,
};

pub const HOSTNAME_PATH: &str = "/etc/hostname";

/// Mode used for most files placed by this crate, `0644`.
pub const DEFAULT_FILE_MODE: u32 = 0o644;

/// Describes a file entry to add to a document.
///
/// Entries are owned by `root`. By default the body replaces whatever is at the path and the
/// entry does not overwrite an existing file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileBuilder {
    path: String,
    contents: ContentSource,
    mode: u32,
    append: bool,
    overwrite: bool,
}

impl FileBuilder {
    pub fn new(path: impl Into<String>, contents: ContentSource) -> Self {
        Self {
            path: path.into(),
            contents,
            mode: DEFAULT_FILE_MODE,
            append: false,
            overwrite: false,
        }
    }

    pub fn mode(mut self, mode: u32) -> Self {
        self.mode = mode;
        self
    }

    /// Appends the body to the file instead of replacing it.
    pub fn append(mut self) -> Self {
        self.append = true;
        self
    }

    pub fn overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    pub fn build(self) -> File {
        let body = Resource::from_source(self.contents);
        let (contents, append) = if self.append {
            (Resource::default(), vec![body])
        } else {
            (body, Vec::new())
        };

        File {
            path: self.path,
            overwrite: Some(self.overwrite),
            user: NodeUser::named("root"),
            mode: Some(self.mode),
            contents,
            append,
            ..File::default()
        }
    }
}

/// Adds the file entry described by `file`, unless an identical entry already exists.
pub fn set_file(config: &mut Config, file: FileBuilder) {
    let file = file.build();
    if !config.storage.files.contains(&file) {
        config.storage.files.push(file);
    }
}

/// Adds an entry appending `contents` to the file at `path`.
pub fn append_line(config: &mut Config, path: impl Into<String>, contents: impl Into<Vec<u8>>, mode: u32) {
    set_file(
        config,
        FileBuilder::new(path, ContentSource::inline(contents))
            .mode(mode)
            .append(),
    );
}

/// Inserts a unit, replacing any existing unit with the same name.
pub fn set_unit(config: &mut Config, unit: Unit) {
    match config
        .systemd
        .units
        .iter_mut()
        .find(|existing| existing.name == unit.name)
    {
        Some(existing) => *existing = unit,
        None => config.systemd.units.push(unit),
    }
}

/// Adds an `/etc/hostname` entry holding `hostname`.
///
/// The entry is appended to the file list rather than replacing earlier entries at the same
/// path, so nothing previously merged into the document is lost.
pub fn set_hostname(config: &mut Config, hostname: &str) {
    set_file(
        config,
        FileBuilder::new(HOSTNAME_PATH, ContentSource::inline(hostname)).overwrite(true),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::version::SpecVersion;

    #[test]
    fn set_file_is_idempotent() {
        let mut config = Config::new(SpecVersion::V3_1);
        let file = FileBuilder::new("/etc/motd", ContentSource::inline("hello\n"));

        set_file(&mut config, file.clone());
        set_file(&mut config, file);

        assert_eq!(config.storage.files.len(), 1);
        let entry = &config.storage.files[0];
        assert_eq!(entry.mode, Some(0o644));
        assert_eq!(entry.overwrite, Some(false));
        assert_eq!(entry.user.name.as_deref(), Some("root"));
        assert_eq!(entry.contents.source, Some(ContentSource::inline("hello\n")));
    }

    #[test]
    fn append_line_uses_append_fragments() {
        let mut config = Config::new(SpecVersion::V3_1);
        append_line(&mut config, "/etc/hosts", "10.0.0.1 api\n", 0o644);
        append_line(&mut config, "/etc/hosts", "10.0.0.2 api\n", 0o644);

        let entries: Vec<_> = config.files_at("/etc/hosts").collect();
        assert_eq!(entries.len(), 2);
        assert!(entries.iter().all(|entry| entry.is_append_only()));
    }

    #[test]
    fn set_unit_replaces_by_name() {
        let mut config = Config::new(SpecVersion::V3_1);
        set_unit(
            &mut config,
            Unit {
                name: "agent.service".to_owned(),
                enabled: Some(true),
                ..Unit::default()
            },
        );
        set_unit(
            &mut config,
            Unit {
                name: "agent.service".to_owned(),
                enabled: Some(false),
                ..Unit::default()
            },
        );

        assert_eq!(config.systemd.units.len(), 1);
        assert_eq!(config.systemd.units[0].enabled, Some(false));
    }

    #[test]
    fn hostname_is_appended_after_existing_entries() {
        let mut config = Config::new(SpecVersion::V3_1);
        set_file(
            &mut config,
            FileBuilder::new(HOSTNAME_PATH, ContentSource::inline("old")),
        );
        set_hostname(&mut config, "master-0");

        let entries: Vec<_> = config.files_at(HOSTNAME_PATH).collect();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].overwrite, Some(true));
        assert_eq!(entries[1].contents.source, Some(ContentSource::inline("master-0")));
    }
}
