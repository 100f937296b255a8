//! Scripted stand-ins for tool-server executables, plus whitelist helpers.

use std::fs;
use std::path::{Path, PathBuf};

/// Answers both `initialize` and `tools/call`, echoing the request id.
const ECHO_TOOL: &str = r##"#!/bin/sh
while read -r line; do
  id=$(printf '%s' "$line" | sed -n 's/.*"id":\([0-9][0-9]*\).*/\1/p')
  case "$line" in
    *'"initialize"'*)
      printf '{"jsonrpc":"2.0","id":%s,"result":{"serverInfo":{"name":"echo-tool","version":"0.1.0"},"protocolVersion":"2024-11-05","capabilities":{"tools":[{"name":"summarize"},{"name":"translate"}]}}}\n' "$id"
      ;;
    *'"tools/call"'*)
      printf '{"jsonrpc":"2.0","id":%s,"result":{"content":[{"type":"text","text":"ok: handled"}]}}\n' "$id"
      ;;
  esac
done
"##;

/// Completes the handshake, then swallows every `tools/call`.
const HANG_TOOL: &str = r##"#!/bin/sh
while read -r line; do
  id=$(printf '%s' "$line" | sed -n 's/.*"id":\([0-9][0-9]*\).*/\1/p')
  case "$line" in
    *'"initialize"'*)
      printf '{"jsonrpc":"2.0","id":%s,"result":{"serverInfo":{"name":"hang-tool"},"capabilities":{"tools":[{"name":"summarize"}]}}}\n' "$id"
      ;;
  esac
done
"##;

/// Completes the handshake, then answers every `tools/call` with an error.
const ERROR_TOOL: &str = r##"#!/bin/sh
while read -r line; do
  id=$(printf '%s' "$line" | sed -n 's/.*"id":\([0-9][0-9]*\).*/\1/p')
  case "$line" in
    *'"initialize"'*)
      printf '{"jsonrpc":"2.0","id":%s,"result":{"serverInfo":{"name":"error-tool"},"capabilities":{"tools":[{"name":"summarize"}]}}}\n' "$id"
      ;;
    *'"tools/call"'*)
      printf '{"jsonrpc":"2.0","id":%s,"error":{"code":-32602,"message":"unknown tool: frobnicate"}}\n' "$id"
      ;;
  esac
done
"##;

pub fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    fs::write(&path, body).expect("write script");
    let mut perms = fs::metadata(&path).expect("stat script").permissions();
    perms.set_mode(0o755);
    fs::set_permissions(&path, perms).expect("chmod script");
    path
}

pub fn echo_tool(dir: &Path) -> PathBuf {
    write_script(dir, "echo-tool", ECHO_TOOL)
}

pub fn hang_tool(dir: &Path) -> PathBuf {
    write_script(dir, "hang-tool", HANG_TOOL)
}

pub fn error_tool(dir: &Path) -> PathBuf {
    write_script(dir, "error-tool", ERROR_TOOL)
}

/// Write a whitelist admitting exactly the given executables.
pub fn write_whitelist(dir: &Path, servers: &[&Path]) -> PathBuf {
    let entries: Vec<String> = servers
        .iter()
        .map(|p| p.to_string_lossy().to_string())
        .collect();
    let document = serde_json::json!({
        "version": "1",
        "allowedServers": entries,
        "description": "integration test servers",
    });
    let path = dir.join("whitelist.json");
    fs::write(&path, document.to_string()).expect("write whitelist");
    path
}
