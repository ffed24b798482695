#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::wildcard_imports,
    clippy::indexing_slicing
)]
//! Integration tests for the `uninstall` command.

mod common;

use common::TestContextBuilder;

#[test]
fn uninstall_reverts_install() {
    let ctx = TestContextBuilder::new()
        .with_module_file("vim", "vimrc.symlink", "set number\n")
        .with_module_file("vim", "editorconfig", "root = true\n")
        .build();
    let global = ctx.global(false, false);

    ctx.install(&[], &global).unwrap();
    ctx.uninstall(&[], &global).unwrap();

    assert!(std::fs::symlink_metadata(ctx.home_file(".vimrc")).is_err());
    assert!(!ctx.home_file(".editorconfig").exists());
    assert!(ctx.module_file("vim", "vimrc.symlink").is_file());
    assert!(ctx.module_file("vim", "editorconfig").is_file());
}

#[test]
fn edited_copy_is_left_in_place() {
    let ctx = TestContextBuilder::new()
        .with_module_file("git", "gitconfig", "[user]\n")
        .build();
    let global = ctx.global(false, false);

    ctx.install(&[], &global).unwrap();
    std::fs::write(ctx.home_file(".gitconfig"), "[user]\n\tname = me\n").unwrap();
    ctx.uninstall(&[], &global).unwrap();

    assert_eq!(
        std::fs::read_to_string(ctx.home_file(".gitconfig")).unwrap(),
        "[user]\n\tname = me\n"
    );
}

#[test]
fn moved_file_is_moved_back() {
    let ctx = TestContextBuilder::new()
        .with_settings(
            "bash",
            r#"{"version": "alpha", "schema": "core",
                "actions": [{"action": "move", "files": {".bashrc": "~/.bashrc.orig"}}]}"#,
        )
        .with_home_file(".bashrc", "# distro default\n")
        .build();
    let global = ctx.global(false, false);

    ctx.install(&[], &global).unwrap();
    assert!(!ctx.home_file(".bashrc").exists());
    ctx.uninstall(&[], &global).unwrap();

    assert_eq!(
        std::fs::read_to_string(ctx.home_file(".bashrc")).unwrap(),
        "# distro default\n"
    );
    assert!(!ctx.home_file(".bashrc.orig").exists());
}

#[test]
fn uninstall_of_never_installed_module_succeeds() {
    let ctx = TestContextBuilder::new()
        .with_module_file("tmux", "tmux.conf.symlink", "")
        .build();

    ctx.uninstall(&[], &ctx.global(false, false)).unwrap();
    assert!(std::fs::symlink_metadata(ctx.home_file(".tmux.conf")).is_err());
}

#[test]
fn dry_run_uninstall_keeps_files() {
    let ctx = TestContextBuilder::new()
        .with_module_file("vim", "vimrc.symlink", "")
        .build();

    ctx.install(&[], &ctx.global(false, false)).unwrap();
    ctx.uninstall(&[], &ctx.global(true, false)).unwrap();

    assert!(ctx.home_file(".vimrc").is_symlink());
}

#[cfg(unix)]
#[test]
fn undo_scripts_run_in_reverse_lifecycle_order() {
    let builder = TestContextBuilder::new();
    let trace = builder.home_path().join("trace.log");
    let trace = trace.display();
    let ctx = builder
        .with_module_file("zsh", "zshrc.symlink", "")
        .with_script("zsh", "undo-post", &format!("echo undo-post >> {trace}"))
        .with_script("zsh", "undo-start", &format!("echo undo-start >> {trace}"))
        .with_script("zsh", "install.sh", &format!("echo install >> {trace}"))
        .with_script("zsh", "uninstall.sh", &format!("echo uninstall >> {trace}"))
        .with_settings(
            "zsh",
            r#"{"version": "alpha", "schema": "core",
                "actions": [{"action": "script", "files": {"install.sh": "uninstall.sh"}}]}"#,
        )
        .build();
    let global = ctx.global(false, false);

    ctx.install(&[], &global).unwrap();
    ctx.uninstall(&[], &global).unwrap();

    insta::assert_snapshot!(
        std::fs::read_to_string(ctx.home_file("trace.log")).unwrap(),
        @r"
    install
    undo-post
    uninstall
    undo-start
    "
    );
}
