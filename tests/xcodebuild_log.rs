use std::path::{Path, PathBuf};

use xcroach::{
    models::{ParserRules, TrailingStep, Verdict},
    parser::{ParseError, parse_stream},
};

const SUCCESSFUL_BUILD: &str = "\
Build settings from command line:
    OBJROOT = /Users/ci/FNConnect/build
    SYMROOT = /Users/ci/FNConnect/build

=== BUILD NATIVE TARGET Pods OF PROJECT Pods WITH CONFIGURATION Release ===
Check dependencies

CompileC build/Pods.build/Release-iphoneos/Pods.build/Objects-normal/armv7/AFNetworking.o Pods/AFNetworking/AFNetworking.m normal armv7 objective-c com.apple.compilers.llvm.clang.1_0.compiler
    cd /Users/ci/FNConnect/Pods
    setenv LANG en_US.US-ASCII
    clang -x objective-c -arch armv7 -c AFNetworking.m

CopyPNGFile build/Release-iphoneos/FNConnect.app/Icon@2x.png FNConnect/Icon@2x.png
    cd /Users/ci/FNConnect
    copypng -compress -strip-PNG-text FNConnect/Icon@2x.png build/Release-iphoneos/FNConnect.app/Icon@2x.png
libpng error: Not a PNG file

Ld build/Release-iphoneos/FNConnect.app/FNConnect normal armv7
    cd /Users/ci/FNConnect
    clang -arch armv7 -o FNConnect

CodeSign build/Release-iphoneos/FNConnect.app
    cd /Users/ci/FNConnect
    /usr/bin/codesign --force --sign 0123456789ABCDEF build/Release-iphoneos/FNConnect.app

** BUILD SUCCEEDED **

";

const FAILED_BUILD: &str = "\
CompileC build/FNConnect.build/Objects-normal/armv7/AppDelegate.o FNConnect/AppDelegate.m normal armv7 objective-c com.apple.compilers.llvm.clang.1_0.compiler
    cd /Users/ci/FNConnect
    clang -x objective-c -arch armv7 -c AppDelegate.m
FNConnect/AppDelegate.m:18:5: warning: unused variable 'x'
FNConnect/AppDelegate.m:21:38: error: expected ';' after expression
    [self.window makeKeyAndVisible]
                                     ^
1 warning and 1 error generated.

CompileC build/FNConnect.build/Objects-normal/armv7/Feed.o FNConnect/Feed.m normal armv7 objective-c com.apple.compilers.llvm.clang.1_0.compiler
    cd /Users/ci/FNConnect
FNConnect/Feed.m:7:9: fatal error: 'Missing.h' file not found
#import \"Missing.h\"
        ^
1 error generated.

** BUILD FAILED **

";

async fn parse(log: &str, rules: ParserRules) -> Result<xcroach::models::ParseOutcome, ParseError> {
    parse_stream(log.as_bytes(), rules, Path::new("/Users/ci/FNConnect")).await
}

#[tokio::test]
async fn successful_build_yields_signed_bundle() {
    let outcome = parse(SUCCESSFUL_BUILD, ParserRules::default()).await.unwrap();

    let kinds: Vec<&str> = outcome.steps.iter().map(|s| s.kind.as_str()).collect();
    assert_eq!(
        kinds,
        vec!["Build", "===", "CompileC", "CopyPNGFile", "Ld", "CodeSign", "**"]
    );
    assert_eq!(
        outcome.verdict,
        Verdict::Success {
            artifact: PathBuf::from("/Users/ci/FNConnect/build/Release-iphoneos/FNConnect.app")
        }
    );
}

#[tokio::test]
async fn failed_build_lists_every_broken_step() {
    let outcome = parse(FAILED_BUILD, ParserRules::default()).await.unwrap();

    let Verdict::Failure { errors } = outcome.verdict else {
        panic!("expected a failure");
    };
    assert_eq!(errors.len(), 2);
    assert!(errors.iter().all(|step| step.kind == "CompileC"));
    assert_eq!(
        errors[0].error_log.as_deref(),
        Some(
            "FNConnect/AppDelegate.m:21:38: error: expected ';' after expression\n    [self.window makeKeyAndVisible]\n                                     ^\n1 warning and 1 error generated.\n"
        )
    );
    assert!(
        errors[1]
            .error_log
            .as_deref()
            .unwrap()
            .starts_with("FNConnect/Feed.m:7:9: fatal error: 'Missing.h' file not found\n")
    );
}

#[tokio::test]
async fn unterminated_log_depends_on_trailing_policy() {
    let truncated = SUCCESSFUL_BUILD.trim_end();

    let dropped = parse(truncated, ParserRules::default()).await.unwrap();
    assert_eq!(dropped.steps.len(), 6);
    assert_eq!(dropped.dropped_tail.as_deref(), Some("** BUILD SUCCEEDED **"));

    let rules = ParserRules {
        trailing: TrailingStep::Flush,
        ..ParserRules::default()
    };
    let flushed = parse(truncated, rules).await.unwrap();
    assert_eq!(flushed.steps.len(), 7);
    assert_eq!(flushed.dropped_tail, None);
}

#[tokio::test]
async fn log_without_code_sign_is_rejected() {
    let log = SUCCESSFUL_BUILD.replace("CodeSign", "Touch");
    let err = parse(&log, ParserRules::default()).await.unwrap_err();
    assert!(matches!(err, ParseError::MissingTerminalStep { .. }));
}
