//! Publish/cleanup pipeline composition
//!
//! The terminal pipeline copies built documentation to the backup root,
//! archives it, regenerates navigation, mirrors the backup root to the
//! live target path, and removes the instruction's temporary directories.
//! Steps are composed here as plain commands; the controller executes
//! them in order, isolating failures per step.

use crate::exec::ExternalCommand;
use docbuild_config::{Config, TargetConfig};
use docbuild_types::Lifecycle;
use std::path::{Path, PathBuf};

/// One named pipeline step
#[derive(Debug, Clone)]
pub(crate) struct PublishStep {
    pub name: &'static str,
    pub command: ExternalCommand,
}

impl PublishStep {
    fn new(name: &'static str, command: ExternalCommand) -> Self {
        Self { name, command }
    }
}

/// Everything the publish steps need, borrowed from the controller
pub(crate) struct PublishContext<'a> {
    pub config: &'a Config,
    pub target_name: &'a str,
    pub target: &'a TargetConfig,
    pub product: &'a str,
    pub docset: &'a str,
    pub lang: &'a str,
    pub lifecycle: Lifecycle,
    /// `lang/product/docset`, relative to both staging and backup roots
    pub relative_path: &'a Path,
    /// Instruction staging root (the temp directory itself)
    pub staging_root: &'a Path,
    /// `staging_root/relative_path`
    pub staging_path: &'a Path,
    /// Fresh temporary directory for regenerated navigation pages
    pub nav_tmp: &'a Path,
    /// Shared stitched configuration document for the target
    pub stitch_file: &'a Path,
}

/// Steps 1-7: publish staged output and refresh navigation. Only composed
/// when something was actually staged.
pub(crate) fn publish_steps(ctx: &PublishContext<'_>) -> Vec<PublishStep> {
    let backup = &ctx.target.backup_path;
    let backup_relative: PathBuf = backup.join(ctx.relative_path);
    let mut steps = Vec::new();

    // 1. remove the previous backup copy for this tuple
    steps.push(PublishStep::new(
        "remove-backup",
        ExternalCommand::new("rm").arg("-rf").path_arg(&backup_relative),
    ));

    // 2. browsable lifecycles get a full copy, unsupported only the
    //    archive directory
    if ctx.lifecycle.browsable() {
        steps.push(PublishStep::new(
            "sync-backup",
            ExternalCommand::new("rsync")
                .arg("-lr")
                .arg(format!("{}/", ctx.staging_root.display()))
                .path_arg(backup),
        ));
    } else {
        steps.push(PublishStep::new(
            "recreate-backup-dir",
            ExternalCommand::new("mkdir").arg("-p").path_arg(&backup_relative),
        ));
    }

    // 3. compressed archive of the staged output
    let zip_name = format!("{}-{}-{}.zip", ctx.product, ctx.docset, ctx.lang);
    steps.push(PublishStep::new(
        "create-archive",
        ExternalCommand::new(ctx.config.server.bin_dir.join("docbuild-create-archive"))
            .arg("--input-path")
            .path_arg(ctx.staging_path)
            .arg("--output-path")
            .path_arg(backup_relative.join(&zip_name))
            .arg("--zip-formats")
            .arg(ctx.target.zip_formats_csv())
            .arg("--cache-path")
            .path_arg(ctx.config.deliverable_cache_dir(ctx.target_name))
            .arg("--relative-output-path")
            .path_arg(ctx.relative_path.join(&zip_name))
            .arg("--product")
            .arg(ctx.product)
            .arg("--docset")
            .arg(ctx.docset)
            .arg("--language")
            .arg(ctx.lang),
    ));

    // 4. regenerate the navigation pages into the fresh temp directory
    steps.push(PublishStep::new(
        "build-navigation",
        ExternalCommand::new(ctx.config.server.bin_dir.join("docbuild-build-navigation"))
            .arg_if(ctx.target.internal, "--internal-mode")
            .arg(format!("--product={}", ctx.product))
            .arg(format!("--docset={}", ctx.docset))
            .arg(format!("--stitched-config={}", ctx.stitch_file.display()))
            .arg(format!("--ui-languages={}", ctx.target.languages))
            .arg_if(
                ctx.target.omit_default_lang_path,
                format!("--omit-lang-path={}", ctx.target.default_lang),
            )
            .arg(format!(
                "--cache-dir={}",
                ctx.config.deliverable_cache_dir(ctx.target_name).display()
            ))
            .arg(format!(
                "--template-dir={}",
                ctx.target.template_dir.display()
            ))
            .arg(format!("--output-dir={}", ctx.nav_tmp.display()))
            .arg(format!("--base-path={}", ctx.target.server_base_path))
            .arg(format!("--htaccess={}", ctx.target.htaccess.display()))
            .arg(format!("--favicon={}", ctx.target.favicon.display())),
    ));

    // 5. navigation into the backup root
    steps.push(PublishStep::new(
        "sync-navigation",
        ExternalCommand::new("rsync")
            .arg("-lr")
            .arg(format!("{}/", ctx.nav_tmp.display()))
            .path_arg(backup),
    ));

    // 6. mirror the backup root as the new authoritative live state
    steps.push(PublishStep::new(
        "sync-live",
        ExternalCommand::new("rsync")
            .arg("--exclude-from")
            .path_arg(ctx.config.server.share_dir.join("rsync/rsync_excludes.txt"))
            .arg("--delete-after")
            .arg("-lr")
            .arg(format!("{}/", backup.display()))
            .path_arg(&ctx.target.target_path),
    ));

    // 7. drop the navigation temp directory
    steps.push(PublishStep::new(
        "remove-nav-tmp",
        ExternalCommand::new("rm").arg("-rf").path_arg(ctx.nav_tmp),
    ));

    steps
}

/// Steps 8-9: remove whichever instruction-private directories were ever
/// created. Safe to compose with either argument absent.
pub(crate) fn removal_steps(
    staging_root: Option<&Path>,
    repo_build_dir: Option<&Path>,
) -> Vec<PublishStep> {
    let mut steps = Vec::new();
    if let Some(root) = staging_root {
        steps.push(PublishStep::new(
            "remove-staging",
            ExternalCommand::new("rm").arg("-rf").path_arg(root),
        ));
    }
    if let Some(dir) = repo_build_dir {
        steps.push(PublishStep::new(
            "remove-repo",
            ExternalCommand::new("rm").arg("-rf").path_arg(dir),
        ));
    }
    steps
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target() -> TargetConfig {
        serde_json::from_value(serde_json::json!({
            "internal": true,
            "config_dir": "/etc/docbuild/external",
            "backup_path": "/backup",
            "target_path": "/srv/www",
            "languages": "en-us de-de",
            "default_lang": "en-us",
            "omit_default_lang_path": true,
            "zip_formats": "html pdf",
            "template_dir": "/templates",
            "server_base_path": "/docs",
            "htaccess": "/share/htaccess",
            "favicon": "/share/favicon.ico"
        }))
        .unwrap()
    }

    fn context<'a>(
        config: &'a Config,
        target: &'a TargetConfig,
        lifecycle: Lifecycle,
    ) -> PublishContext<'a> {
        PublishContext {
            config,
            target_name: "external",
            target,
            product: "sles",
            docset: "15ga",
            lang: "en",
            lifecycle,
            relative_path: Path::new("en/sles/15ga"),
            staging_root: Path::new("/tmp/docbuild_deliverable_x"),
            staging_path: Path::new("/tmp/docbuild_deliverable_x/en/sles/15ga"),
            nav_tmp: Path::new("/tmp/docbuild_navigation_y"),
            stitch_file: Path::new("/var/tmp/stitch/productconfig_simplified_external.json"),
        }
    }

    #[test]
    fn step_order_is_fixed() {
        let config = Config::default();
        let target = target();
        let steps = publish_steps(&context(&config, &target, Lifecycle::Supported));
        let names: Vec<_> = steps.iter().map(|s| s.name).collect();
        assert_eq!(
            names,
            [
                "remove-backup",
                "sync-backup",
                "create-archive",
                "build-navigation",
                "sync-navigation",
                "sync-live",
                "remove-nav-tmp",
            ]
        );
    }

    #[test]
    fn unsupported_gets_archive_only() {
        let config = Config::default();
        let target = target();
        let steps = publish_steps(&context(&config, &target, Lifecycle::Unsupported));
        assert_eq!(steps[1].name, "recreate-backup-dir");
        assert!(steps[1].command.display().starts_with("mkdir -p /backup/en/sles/15ga"));
    }

    #[test]
    fn archive_command_names_the_tuple() {
        let config = Config::default();
        let target = target();
        let steps = publish_steps(&context(&config, &target, Lifecycle::Beta));
        let archive = steps.iter().find(|s| s.name == "create-archive").unwrap();
        let display = archive.command.display();
        assert!(display.contains("--output-path /backup/en/sles/15ga/sles-15ga-en.zip"));
        assert!(display.contains("--zip-formats html,pdf"));
    }

    #[test]
    fn navigation_flags_follow_target() {
        let config = Config::default();
        let target = target();
        let steps = publish_steps(&context(&config, &target, Lifecycle::Supported));
        let nav = steps.iter().find(|s| s.name == "build-navigation").unwrap();
        let display = nav.command.display();
        assert!(display.contains("--internal-mode"));
        assert!(display.contains("--omit-lang-path=en-us"));
        assert!(display.contains("--ui-languages=en-us de-de"));
    }

    #[test]
    fn sync_live_mirrors_with_excludes() {
        let config = Config::default();
        let target = target();
        let steps = publish_steps(&context(&config, &target, Lifecycle::Supported));
        let live = steps.iter().find(|s| s.name == "sync-live").unwrap();
        let display = live.command.display();
        assert!(display.contains("--exclude-from /usr/share/docbuild/rsync/rsync_excludes.txt"));
        assert!(display.contains("--delete-after"));
        assert!(display.ends_with("/backup/ /srv/www"));
    }

    #[test]
    fn removal_steps_skip_absent_dirs() {
        assert!(removal_steps(None, None).is_empty());
        let steps = removal_steps(Some(Path::new("/tmp/staging")), None);
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].name, "remove-staging");
        let steps = removal_steps(
            Some(Path::new("/tmp/staging")),
            Some(Path::new("/var/tmp/repo/abc")),
        );
        assert_eq!(steps.len(), 2);
    }
}
