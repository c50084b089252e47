//! Test-only helpers: local git remotes and scripted collaborators.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::rc::Rc;

use anyhow::{Context, Result, anyhow};
use tempfile::TempDir;

use crate::core::recipe::RecipeConfig;
use crate::core::request::RepoId;
use crate::io::config::CommitIdentity;
use crate::io::generator::Generator;
use crate::io::git::Git;
use crate::io::github::{PullHead, PullRequestHandle, RepositoryHost};
use crate::io::http::Fetch;
use crate::resolve::VersionSource;
use crate::update::RECIPE_PATH;

pub const TEST_OWNER: &str = "someone";
pub const TEST_BRANCH: &str = "update-pkg";

fn git(dir: &Path, args: &[&str]) -> Result<String> {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .env("GIT_TERMINAL_PROMPT", "0")
        .output()
        .with_context(|| format!("spawn git {}", args.join(" ")))?;
    if !output.status.success() {
        return Err(anyhow!(
            "git {} failed: {}",
            args.join(" "),
            String::from_utf8_lossy(&output.stderr).trim()
        ));
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// Initialize a repo on `main` with a test identity and one commit.
pub fn init_repo(path: &Path) -> Result<Git> {
    git(path, &["init", "-q", "-b", "main"])?;
    git(path, &["config", "user.name", "Test"])?;
    git(path, &["config", "user.email", "test@example.com"])?;
    git(path, &["config", "commit.gpgsign", "false"])?;
    fs::write(path.join("README.md"), "feedstock\n").context("write README")?;
    git(path, &["add", "README.md"])?;
    git(path, &["commit", "-q", "-m", "initial"])?;
    Ok(Git::new(path))
}

/// Minimal recipe with a `{% set version %}` statement and no checksums.
pub fn recipe_text(version: &str, build_number: u32) -> String {
    format!(
        "{{% set name = \"pkg\" %}}\n\
         {{% set version = \"{version}\" %}}\n\
         \n\
         package:\n  name: {{{{ name }}}}\n  version: {{{{ version }}}}\n\
         \n\
         source:\n  path: ..\n\
         \n\
         build:\n  number: {build_number}\n"
    )
}

/// Write and commit `recipe/meta.yaml`.
pub fn write_recipe(git: &Git, version: &str, build_number: u32) -> Result<()> {
    let path = git.workdir().join(RECIPE_PATH);
    fs::create_dir_all(path.parent().context("recipe dir")?)?;
    fs::write(&path, recipe_text(version, build_number)).context("write recipe")?;
    git.add(&[RECIPE_PATH])?;
    git.commit_staged("add recipe")?;
    Ok(())
}

/// Bare repository served from a temp directory as `file://<root>/<owner>/<name>.git`.
pub struct TestRemote {
    root: TempDir,
    name: String,
}

impl TestRemote {
    /// Seed a feedstock with a recipe, a workflow and `conda-forge.yml` on
    /// [`TEST_BRANCH`].
    pub fn feedstock(name: &str, version: &str) -> Result<Self> {
        let root = tempfile::tempdir().context("tempdir")?;
        let bare = root.path().join(TEST_OWNER).join(format!("{name}.git"));
        fs::create_dir_all(&bare)?;
        git(&bare, &["init", "-q", "--bare"])?;
        git(&bare, &["symbolic-ref", "HEAD", &format!("refs/heads/{TEST_BRANCH}")])?;

        let seed = tempfile::tempdir().context("seed tempdir")?;
        let repo = init_repo(seed.path())?;
        let workflows = seed.path().join(".github/workflows");
        fs::create_dir_all(&workflows)?;
        fs::write(workflows.join("ci.yml"), "name: ci\n")?;
        fs::write(
            seed.path().join("conda-forge.yml"),
            "conda_forge_output_validation: true\n",
        )?;
        repo.add(&[".github/workflows/ci.yml", "conda-forge.yml"])?;
        repo.commit_staged("add ci")?;
        write_recipe(&repo, version, 3)?;
        let url = bare.to_string_lossy().to_string();
        git(seed.path(), &["push", "-q", &url, &format!("HEAD:refs/heads/{TEST_BRANCH}")])?;

        Ok(Self {
            root,
            name: name.to_string(),
        })
    }

    /// Install a `pre-receive` hook that refuses every push.
    pub fn reject_pushes(&self) -> Result<()> {
        use std::os::unix::fs::PermissionsExt;

        let hook = self.bare_path().join("hooks").join("pre-receive");
        fs::create_dir_all(hook.parent().context("hooks dir")?)?;
        fs::write(&hook, "#!/bin/sh\necho 'pushes are disabled' >&2\nexit 1\n")
            .context("write pre-receive hook")?;
        fs::set_permissions(&hook, fs::Permissions::from_mode(0o755))
            .context("make hook executable")?;
        Ok(())
    }

    pub fn server_url(&self) -> String {
        format!("file://{}", self.root.path().display())
    }

    pub fn owner(&self) -> &str {
        TEST_OWNER
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn branch(&self) -> &str {
        TEST_BRANCH
    }

    pub fn repo(&self) -> RepoId {
        RepoId::new(TEST_OWNER, self.name.clone())
    }

    pub fn head(&self) -> PullHead {
        PullHead {
            branch: TEST_BRANCH.to_string(),
            repo: self.repo(),
        }
    }

    fn bare_path(&self) -> PathBuf {
        self.root
            .path()
            .join(TEST_OWNER)
            .join(format!("{}.git", self.name))
    }

    /// Clone the branch with the default bot identity.
    pub fn clone_into(&self, dest: &Path) -> Result<Git> {
        let target = dest.join(&self.name);
        let url = format!("{}/{}/{}.git", self.server_url(), TEST_OWNER, self.name);
        let cloned = Git::clone_branch(&url, TEST_BRANCH, &target)?;
        let identity = CommitIdentity::default();
        cloned.set_config("user.name", &identity.name)?;
        cloned.set_config("user.email", &identity.email)?;
        Ok(cloned)
    }

    pub fn head_sha(&self) -> Result<String> {
        git(&self.bare_path(), &["rev-parse", &format!("refs/heads/{TEST_BRANCH}")])
    }

    pub fn commit_count(&self) -> Result<usize> {
        let out = git(
            &self.bare_path(),
            &["rev-list", "--count", &format!("refs/heads/{TEST_BRANCH}")],
        )?;
        out.parse::<usize>().context("parse commit count")
    }

    /// Subjects of the branch's commits, newest first.
    pub fn subjects(&self) -> Result<Vec<String>> {
        let out = git(
            &self.bare_path(),
            &["log", "--format=%s", &format!("refs/heads/{TEST_BRANCH}")],
        )?;
        Ok(out.lines().map(str::to_string).collect())
    }

    /// File contents at the branch tip.
    pub fn file(&self, path: &str) -> Result<String> {
        git(&self.bare_path(), &["show", &format!("refs/heads/{TEST_BRANCH}:{path}")])
    }

    pub fn recipe(&self) -> Result<RecipeConfig> {
        Ok(RecipeConfig::parse(&self.file(RECIPE_PATH)?))
    }
}

#[derive(Debug, Clone)]
enum Script {
    Fail,
    NoChange,
    Commit(Vec<(String, String)>),
}

/// Generator that replays a fixed behavior and counts calls.
#[derive(Debug)]
pub struct ScriptedGenerator {
    script: Script,
    calls: Cell<usize>,
}

impl ScriptedGenerator {
    fn new(script: Script) -> Self {
        Self {
            script,
            calls: Cell::new(0),
        }
    }

    pub fn failing() -> Self {
        Self::new(Script::Fail)
    }

    pub fn no_change() -> Self {
        Self::new(Script::NoChange)
    }

    /// Write `files` and commit them together with anything already staged.
    pub fn committing(files: &[(&str, &str)]) -> Self {
        Self::new(Script::Commit(
            files
                .iter()
                .map(|(path, contents)| (path.to_string(), contents.to_string()))
                .collect(),
        ))
    }

    pub fn calls(&self) -> usize {
        self.calls.get()
    }
}

impl Generator for ScriptedGenerator {
    fn generate(&self, workdir: &Path) -> Result<()> {
        self.calls.set(self.calls.get() + 1);
        match &self.script {
            Script::Fail => Err(anyhow!("scripted generator failure")),
            Script::NoChange => Ok(()),
            Script::Commit(files) => {
                let repo = Git::new(workdir);
                for (path, contents) in files {
                    let full = workdir.join(path);
                    if let Some(parent) = full.parent() {
                        fs::create_dir_all(parent)?;
                    }
                    fs::write(&full, contents)?;
                    repo.add(&[path.as_str()])?;
                }
                repo.commit_staged("MNT: Re-rendered with conda-build and conda-smithy")?;
                Ok(())
            }
        }
    }
}

/// Version source with a canned answer.
pub struct StaticSource {
    name: String,
    answer: Result<Option<String>, String>,
}

impl StaticSource {
    pub fn version(name: &str, version: &str) -> Self {
        Self {
            name: name.to_string(),
            answer: Ok(Some(version.to_string())),
        }
    }

    pub fn empty(name: &str) -> Self {
        Self {
            name: name.to_string(),
            answer: Ok(None),
        }
    }

    pub fn failing(name: &str) -> Self {
        Self {
            name: name.to_string(),
            answer: Err(format!("{name} unavailable")),
        }
    }
}

impl VersionSource for StaticSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn try_resolve(&self, _package: &str, _recipe: &RecipeConfig) -> Result<Option<String>> {
        self.answer.clone().map_err(|err| anyhow!(err))
    }
}

/// In-memory `Fetch`. Unknown URLs answer "not found".
#[derive(Debug, Default)]
pub struct FakeFetch {
    texts: HashMap<String, String>,
    bytes: HashMap<String, Vec<u8>>,
    existing: HashSet<String>,
}

impl FakeFetch {
    pub fn with_text(mut self, url: &str, body: &str) -> Self {
        self.texts.insert(url.to_string(), body.to_string());
        self
    }

    pub fn with_bytes(mut self, url: &str, body: &[u8]) -> Self {
        self.bytes.insert(url.to_string(), body.to_vec());
        self
    }

    pub fn with_existing(mut self, url: &str) -> Self {
        self.existing.insert(url.to_string());
        self
    }
}

impl Fetch for FakeFetch {
    fn get_text(&self, url: &str) -> Result<Option<String>> {
        Ok(self.texts.get(url).cloned())
    }

    fn get_bytes(&self, url: &str) -> Result<Option<Vec<u8>>> {
        Ok(self
            .bytes
            .get(url)
            .cloned()
            .or_else(|| self.texts.get(url).map(|text| text.clone().into_bytes())))
    }

    fn exists(&self, url: &str) -> Result<bool> {
        Ok(self.existing.contains(url)
            || self.texts.contains_key(url)
            || self.bytes.contains_key(url))
    }
}

#[derive(Debug, Default)]
struct PullRecord {
    comments: Vec<String>,
    closed: bool,
}

/// Pull request double that records comments and closes.
#[derive(Debug, Clone)]
pub struct FakePull {
    number: u64,
    closed: bool,
    head: PullHead,
    labels: Vec<String>,
    record: Rc<RefCell<PullRecord>>,
}

impl FakePull {
    pub fn open(number: u64, branch: &str) -> Self {
        Self::for_head(
            number,
            PullHead {
                branch: branch.to_string(),
                repo: RepoId::new(TEST_OWNER, "pkg-feedstock"),
            },
        )
    }

    pub fn for_head(number: u64, head: PullHead) -> Self {
        Self {
            number,
            closed: false,
            head,
            labels: Vec::new(),
            record: Rc::new(RefCell::new(PullRecord::default())),
        }
    }

    pub fn closed(mut self) -> Self {
        self.closed = true;
        self
    }

    pub fn comments(&self) -> Vec<String> {
        self.record.borrow().comments.clone()
    }

    pub fn was_closed(&self) -> bool {
        self.record.borrow().closed
    }
}

impl PullRequestHandle for FakePull {
    fn number(&self) -> u64 {
        self.number
    }

    fn is_closed(&self) -> bool {
        self.closed
    }

    fn head(&self) -> &PullHead {
        &self.head
    }

    fn labels(&self) -> &[String] {
        &self.labels
    }

    fn post_comment(&self, body: &str) -> Result<()> {
        self.record.borrow_mut().comments.push(body.to_string());
        Ok(())
    }

    fn close(&self) -> Result<()> {
        self.record.borrow_mut().closed = true;
        Ok(())
    }
}

/// Host serving a single pull request. Handles share its record.
#[derive(Debug)]
pub struct FakeHost {
    pull: FakePull,
}

impl FakeHost {
    pub fn new(pull: FakePull) -> Self {
        Self { pull }
    }

    pub fn pull(&self) -> &FakePull {
        &self.pull
    }
}

impl RepositoryHost for FakeHost {
    type Pull = FakePull;

    fn pull_request(&self, _repo: &RepoId, number: u64) -> Result<FakePull> {
        if number != self.pull.number {
            return Err(anyhow!("pull request #{number} not found"));
        }
        Ok(self.pull.clone())
    }
}
