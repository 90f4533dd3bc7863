//! Built-in rule data
//!
//! The lists below are the shipped configuration. A config file can extend
//! or replace them; the engine does not care where they came from.

use crate::inline::InterpreterSpec;
use crate::rules::RuleSpec;
use crate::wrapper::WrapperSpec;

/// Any reference to these paths is denied, whatever the verb
const ZERO_ACCESS_PATHS: &[(&str, &str)] = &[
    ("ssh-dir", r"\.ssh/"),
    ("aws-dir", r"\.aws/"),
    ("gnupg-dir", r"\.gnupg/"),
    ("docker-config", r"\.docker/config\.json"),
    ("kube-config", r"\.kube/config"),
    ("netrc", r"\.netrc"),
    ("npmrc", r"\.npmrc"),
    ("pypirc", r"\.pypirc"),
    ("git-credentials", r"\.git-credentials"),
    ("gcp-service-account", r"serviceAccount.*\.json"),
    ("firebase-admin-sdk", r"firebase-adminsdk.*\.json"),
];

const DENY_PATTERNS: &[(&str, &str)] = &[
    // Filesystem destruction
    ("rm-rf-root", r#"rm\s+-rf\s+/\s*($|[;&|"')}\]])"#),
    (
        "rm-rf-system-dir",
        r"rm\s+-rf\s+/(etc|usr|var|bin|sbin|lib|boot|dev|proc|sys|opt|root|System|Library|Applications)\b",
    ),
    ("rm-rf-home", r"rm\s+-rf\s+~\s*($|[;&|/])"),
    ("mkfs", r"mkfs\."),
    ("dd-overwrite", r"dd\s+if=/dev/(zero|random|urandom)\s+of=/"),
    ("fork-bomb", r":\(\)\s*\{.*:\|:.*\}"),
    ("overwrite-disk-device", r">\s*/dev/sd[a-z]"),
    ("chmod-777-root", r"chmod\s+-R\s+777\s+/"),
    // Credential access
    ("etc-shadow", r"/etc/shadow"),
    ("etc-passwd", r"/etc/passwd"),
    ("macos-keychain", r"security\s+find.*password"),
    // Pipe to shell, from any source
    ("pipe-to-shell", r"\|\s*(bash|sh|zsh|dash|ksh|fish|eval)\b"),
    // Git history destruction
    ("force-push-main", r"push\s+--force\s+(origin\s+)?(main|master)\b"),
    ("force-push-main-short", r"git\s+push\s+-f\s+(origin\s+)?(main|master)\b"),
    // Databases
    ("drop-database", r"DROP\s+(DATABASE|SCHEMA)\b"),
    ("truncate-table", r"TRUNCATE\s+TABLE\b"),
    ("delete-without-where", r"DELETE\s+FROM\s+\S+\s*;"),
    // Cloud and infrastructure
    ("terraform-destroy", r"terraform\s+destroy\b"),
    ("pulumi-destroy", r"pulumi\s+destroy\b"),
    ("s3-force-remove-bucket", r"aws\s+s3\s+rb\s+.*--force"),
    ("gcloud-delete-project", r"gcloud\s+projects\s+delete\b"),
    ("docker-prune-all", r"docker\s+system\s+prune\s+-a"),
    ("kubectl-delete-all", r"kubectl\s+delete\s+(namespace|all\s+--all)"),
    ("gh-repo-delete", r"gh\s+repo\s+delete\b"),
    ("heroku-destroy", r"heroku\s+apps:destroy\b"),
    ("supabase-db-reset", r"supabase\s+db\s+reset\b"),
    ("redis-flushall", r"redis-cli\s+FLUSHALL\b"),
];

const ALLOW_PATTERNS: &[(&str, &str)] = &[
    ("js-toolchain", r"^(git|npm|pnpm|npx|yarn|bun|node|deno)\b"),
    ("python-toolchain", r"^(python3?|pip3?|uv|poetry|conda)\b"),
    ("containers", r"^(docker|docker-compose|podman)\b"),
    (
        "paas-cli",
        r"^(stripe|vercel|supabase|fly|railway|heroku|netlify|firebase|wrangler|coolify)\b",
    ),
    ("cloud-cli", r"^(aws|gcloud|az|terraform|kubectl|helm)\b"),
    ("read-search", r"^(ls|cat|head|tail|find|grep|rg|ag|wc|sort|uniq|diff|comm)\b"),
    ("shell-builtins", r"^(echo|printf|test|\[|true|false|pwd|whoami|which|whereis|type|file)\b"),
    ("file-ops", r"^(mkdir|touch|cp|mv|ln|cd)\b"),
    ("http-clients", r"^(curl|wget|http)\b"),
    ("text-processing", r"^(jq|yq|sed|awk|cut|tr|tee|xargs)\b"),
    ("archives", r"^(tar|zip|unzip|gzip|gunzip|bzip2)\b"),
    ("build-tools", r"^(make|cmake|cargo|go|rustc|gcc|g\+\+|javac|java|mvn|gradle)\b"),
    (
        "system-info",
        r"^(open|pbcopy|pbpaste|say|sips|sw_vers|uname|hostname|uptime|df|du|free|top|htop)\b",
    ),
    // `time` and `timeout` are wrappers: what they run is checked on its own
    ("time-control", r"^(date|cal|sleep|wait)\b"),
    ("process-control", r"^(lsof|ps|kill|killall|pgrep|pkill)\b"),
    ("remote-shell", r"^(ssh|scp|rsync)\b"),
    ("database-clients", r"^(psql|mysql|sqlite3|mongosh|redis-cli)\b"),
    ("forge-cli", r"^(gh|hub|lab)\b"),
    ("permissions", r"^(chmod|chown)\b"),
    ("source", r"^(source|\.)\s"),
    ("shell-vars", r"^(export|unset|set)\b"),
    ("shell-keywords", r"^(if|for|while|case|do|done|then|else|fi)\b"),
    ("comment", r"^#"),
    ("environment", r"^(env\s*$|(printenv|read)\b)"),
    ("version-managers", r"^(nvm|fnm|volta|asdf|mise|rtx)\b"),
    ("package-managers", r"^(brew|apt|yum|dnf|pacman|apk)\b"),
    ("service-status", r"^(systemctl|launchctl|service)\s+(status|list|show)\b"),
    ("claude", r"^(claude)\b"),
    (
        "path-inspection",
        r"^(readlink|realpath|basename|dirname|stat|md5|sha\d+sum|shasum)\b",
    ),
    (
        "rm-build-artifacts",
        r"^rm\s+(-[rfv]+\s+)*(\S+/)*(node_modules|dist|build|lib|\.next|\.cache|\.turbo|coverage|\.parcel-cache|__pycache__|\.pytest_cache|\.mypy_cache|\.venv|venv|out|\.output|\.nuxt|\.svelte-kit|\.angular|target/debug|target/release)\b",
    ),
    ("rm-single-file", r"^rm\s+(-[fv]+\s+)*[^-\s]"),
];

fn specs(pairs: &[(&str, &str)]) -> Vec<RuleSpec> {
    pairs.iter().map(|(id, pattern)| RuleSpec::new(id, pattern)).collect()
}

pub fn zero_access() -> Vec<RuleSpec> {
    specs(ZERO_ACCESS_PATHS)
}

pub fn deny() -> Vec<RuleSpec> {
    specs(DENY_PATTERNS)
}

pub fn allow() -> Vec<RuleSpec> {
    specs(ALLOW_PATTERNS)
}

pub fn wrappers() -> Vec<WrapperSpec> {
    vec![
        WrapperSpec::new("sudo").with_value_flags(&["-u", "-g", "-C", "-h", "-p", "-U"]),
        WrapperSpec::new("timeout")
            .with_value_flags(&["-s", "-k"])
            .with_positional_args(1),
        WrapperSpec::new("time").with_value_flags(&["-f", "-o"]),
        WrapperSpec::new("nice").with_value_flags(&["-n"]),
        WrapperSpec::new("nohup"),
        WrapperSpec::new("strace").with_value_flags(&["-e", "-o", "-p", "-s", "-u"]),
        WrapperSpec::new("ltrace").with_value_flags(&["-e", "-o", "-p", "-s", "-u"]),
        WrapperSpec::new("watch").with_value_flags(&["-n", "-d"]),
        WrapperSpec::new("caffeinate").with_value_flags(&["-t", "-w"]),
        WrapperSpec::new("unbuffer"),
        WrapperSpec::new("command"),
        WrapperSpec::new("env")
            .with_value_flags(&["-u", "-C", "--unset", "--chdir"])
            .setting_env(),
    ]
}

/// Interpreters in scan order. `python` also covers versioned names.
pub fn interpreters() -> Vec<InterpreterSpec> {
    [
        ("python", "-c"),
        ("python3", "-c"),
        ("python2", "-c"),
        ("bash", "-c"),
        ("sh", "-c"),
        ("zsh", "-c"),
        ("dash", "-c"),
        ("ksh", "-c"),
        ("node", "-e"),
        ("ruby", "-e"),
        ("perl", "-e"),
        ("lua", "-e"),
        ("php", "-r"),
    ]
    .iter()
    .map(|(name, flag)| InterpreterSpec::new(name, flag))
    .collect()
}
