#[cfg(test)]
mod scanner_tests {
    use lunac as luna;

    use luna::error::CompileError;
    use luna::scanner::*;
    use luna::token::*;

    fn assert_token_sequence(source: &str, expected: &[(TokenType, &str)]) {
        let scanner = Scanner::new(source.as_bytes());
        let tokens: Vec<_> = scanner.filter_map(Result::ok).collect();

        assert_eq!(tokens.len(), expected.len());

        for (actual, (expected_type, expected_lexeme)) in tokens.iter().zip(expected.iter()) {
            assert_eq!(actual.token_type, *expected_type);
            assert_eq!(actual.lexeme, *expected_lexeme);
        }
    }

    fn single_token(source: &str) -> TokenType {
        let mut scanner = Scanner::new(source.as_bytes());

        match scanner.next() {
            Some(Ok(token)) => token.token_type,
            other => panic!("Expected a token, got {:?}", other.map(|r| r.map(|t| t.token_type))),
        }
    }

    #[test]
    fn test_scanner_01_symbols() {
        assert_token_sequence(
            "(#*,+:)",
            &[
                (TokenType::LEFT_PAREN, "("),
                (TokenType::HASH, "#"),
                (TokenType::STAR, "*"),
                (TokenType::COMMA, ","),
                (TokenType::PLUS, "+"),
                (TokenType::COLON, ":"),
                (TokenType::RIGHT_PAREN, ")"),
                (TokenType::EOF, ""),
            ],
        );
    }

    #[test]
    fn test_scanner_02_two_character_operators() {
        assert_token_sequence(
            "// / .. == = ~= <= < >= > -",
            &[
                (TokenType::SLASH_SLASH, "//"),
                (TokenType::SLASH, "/"),
                (TokenType::DOT_DOT, ".."),
                (TokenType::EQUAL_EQUAL, "=="),
                (TokenType::EQUAL, "="),
                (TokenType::TILDE_EQUAL, "~="),
                (TokenType::LESS_EQUAL, "<="),
                (TokenType::LESS, "<"),
                (TokenType::GREATER_EQUAL, ">="),
                (TokenType::GREATER, ">"),
                (TokenType::MINUS, "-"),
                (TokenType::EOF, ""),
            ],
        );
    }

    #[test]
    fn test_scanner_03_keywords_and_identifiers() {
        assert_token_sequence(
            "require local x : integer number string nil functions",
            &[
                (TokenType::REQUIRE, "require"),
                (TokenType::LOCAL, "local"),
                (TokenType::IDENTIFIER, "x"),
                (TokenType::COLON, ":"),
                (TokenType::TYPE_INTEGER, "integer"),
                (TokenType::TYPE_NUMBER, "number"),
                (TokenType::TYPE_STRING, "string"),
                (TokenType::NIL, "nil"),
                (TokenType::IDENTIFIER, "functions"),
                (TokenType::EOF, ""),
            ],
        );
    }

    #[test]
    fn test_scanner_04_comments_are_skipped() {
        let source = "a -- line comment\n--[[ block\ncomment ]] b";
        let tokens: Vec<_> = Scanner::new(source.as_bytes())
            .filter_map(Result::ok)
            .collect();

        assert_eq!(tokens.len(), 3);
        assert_eq!(tokens[0].lexeme, "a");
        assert_eq!(tokens[1].lexeme, "b");
        assert_eq!(tokens[1].line, 3, "block comment newlines must be counted");
    }

    #[test]
    fn test_scanner_05_numbers() {
        assert_eq!(single_token("42"), TokenType::INTEGER(0));
        assert_eq!(single_token("3.25"), TokenType::NUMBER(0.0));
        assert_eq!(single_token("1e3"), TokenType::NUMBER(0.0));

        match single_token("2.5E+1") {
            TokenType::NUMBER(n) => assert_eq!(n, 25.0),
            other => panic!("Expected NUMBER, got {:?}", other),
        }

        match single_token("1234") {
            TokenType::INTEGER(n) => assert_eq!(n, 1234),
            other => panic!("Expected INTEGER, got {:?}", other),
        }
    }

    #[test]
    fn test_scanner_06_string_escapes() {
        match single_token(r#""a\tb\"c\\\065\n""#) {
            TokenType::STRING(s) => assert_eq!(s, "a\tb\"c\\A\n"),
            other => panic!("Expected STRING, got {:?}", other),
        }
    }

    #[test]
    fn test_scanner_07_token_display() {
        let tokens: Vec<_> = Scanner::new(b"x 7 \"hi\"")
            .filter_map(Result::ok)
            .map(|t| t.to_string())
            .collect();

        assert_eq!(
            tokens,
            vec!["IDENTIFIER x null", "INTEGER 7 7", "STRING \"hi\" hi", "EOF  null"]
        );
    }

    #[test]
    fn test_unexpected_chars_token_sequence() {
        let source = ",:$(@";
        let scanner = Scanner::new(source.as_bytes());

        let results: Vec<_> = scanner.collect();

        // 0: COMMA, 1: COLON, 2: error '$', 3: LEFT_PAREN, 4: error '@', 5: EOF
        assert_eq!(results.len(), 6, "Expected 6 items in result");

        assert_token_matches(&results[0], TokenType::COMMA, ",");
        assert_token_matches(&results[1], TokenType::COLON, ":");
        assert_token_matches(&results[3], TokenType::LEFT_PAREN, "(");
        assert_token_matches(&results[5], TokenType::EOF, "");

        let errors: Vec<_> = results.iter().filter_map(|r| r.as_ref().err()).collect();
        assert_eq!(errors.len(), 2, "Expected 2 error messages");

        for err in errors {
            assert_eq!(err.exit_code(), 1);
            assert!(
                err.to_string().contains("Unexpected character"),
                "Error message should contain 'Unexpected character', got: {}",
                err
            );
        }

        // Helper function
        fn assert_token_matches(
            result: &Result<Token, CompileError>,
            expected_type: TokenType,
            expected_lexeme: &str,
        ) {
            match result {
                Ok(token) => {
                    assert_eq!(
                        token.token_type, expected_type,
                        "Expected token type {:?}, got {:?}",
                        expected_type, token.token_type
                    );
                    assert_eq!(
                        token.lexeme, expected_lexeme,
                        "Expected lexeme '{}', got '{}'",
                        expected_lexeme, token.lexeme
                    );
                }
                Err(e) => panic!("Expected token but got error: {}", e),
            }
        }
    }

    #[test]
    fn test_unterminated_string_is_lexical_error() {
        let results: Vec<_> = Scanner::new(b"\"abc\nx").collect();

        let err = results[0].as_ref().unwrap_err();
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn test_escape_out_of_range() {
        let results: Vec<_> = Scanner::new(br#""\256""#).collect();

        assert!(results[0].is_err());
    }
}
