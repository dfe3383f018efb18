use sigcomp_lexer::{tokenize, Token};

#[test]
fn double_star_is_caret() {
    assert_eq!(
        tokenize("t**2"),
        vec![Token::Ident, Token::Caret, Token::Integer]
    );
    assert_eq!(tokenize("t^2"), tokenize("t**2"));
}

#[test]
fn equation_and_indexing() {
    assert_eq!(
        tokenize("y[n] = x[n-1]"),
        vec![
            Token::Ident,
            Token::LBracket,
            Token::Ident,
            Token::RBracket,
            Token::Assign,
            Token::Ident,
            Token::LBracket,
            Token::Ident,
            Token::Minus,
            Token::Integer,
            Token::RBracket
        ]
    );
}

#[test]
fn comma_separated_arguments() {
    assert_eq!(
        tokenize("f(a, b)"),
        vec![
            Token::Ident,
            Token::LParen,
            Token::Ident,
            Token::Comma,
            Token::Ident,
            Token::RParen
        ]
    );
}
