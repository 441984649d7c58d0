//! 심볼 목록 페이지 스트림.

use futures::stream::{self, Stream, TryStreamExt};

use crate::{ExchangeError, ExchangeResult, MarketDataSource};

enum Cursor {
    Start,
    Next(String),
    Done,
}

/// 거래 중인 심볼을 페이지 단위로 내보내는 유한 스트림.
///
/// 커서가 비거나 같은 커서가 반복되면 끝납니다. 처음부터 다시 읽으려면 새 스트림을
/// 만들어야 합니다.
pub fn symbol_pages<'a, S>(source: &'a S) -> impl Stream<Item = ExchangeResult<Vec<String>>> + 'a
where
    S: MarketDataSource + ?Sized,
{
    stream::try_unfold(Cursor::Start, move |cursor| async move {
        let token = match &cursor {
            Cursor::Start => None,
            Cursor::Next(c) => Some(c.clone()),
            Cursor::Done => return Ok(None),
        };

        let page = source.list_symbols(token.as_deref()).await?;
        let next = match page.next_cursor {
            Some(c) if !c.is_empty() && token.as_deref() != Some(c.as_str()) => Cursor::Next(c),
            _ => Cursor::Done,
        };

        Ok::<_, ExchangeError>(Some((page.symbols, next)))
    })
}

/// 모든 페이지를 모아 정렬된 심볼 목록을 반환합니다.
pub async fn list_trading_symbols<S>(source: &S) -> ExchangeResult<Vec<String>>
where
    S: MarketDataSource + ?Sized,
{
    let mut symbols: Vec<String> = symbol_pages(source).try_concat().await?;
    symbols.sort();
    symbols.dedup();
    Ok(symbols)
}
